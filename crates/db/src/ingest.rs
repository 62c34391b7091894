//! Bulk catalog ingestion from owner-supplied CSV files. One malformed row
//! never sinks the batch: bad rows are skipped and reported, good rows land.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use vendy_core::domain::product::{Availability, Product, ProductId};
use vendy_core::domain::tenant::TenantId;

use crate::repositories::{ProductRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("csv input is empty")]
    Empty,
    #[error("csv header is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub applied: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

struct ColumnMap {
    sku: usize,
    name: usize,
    description: Option<usize>,
    price: Option<usize>,
    unit: Option<usize>,
    availability: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Result<Self, IngestError> {
        let find = |needle: &str| {
            header.iter().position(|column| column.trim().eq_ignore_ascii_case(needle))
        };
        Ok(Self {
            sku: find("sku").ok_or(IngestError::MissingColumn("sku"))?,
            name: find("name").ok_or(IngestError::MissingColumn("name"))?,
            description: find("description"),
            price: find("price"),
            unit: find("unit"),
            availability: find("availability"),
        })
    }
}

/// Upserts catalog rows keyed by (tenant, sku). Existing products keep their
/// id so open cart lines stay attached across re-ingestion.
pub async fn ingest_catalog_csv(
    products: &dyn ProductRepository,
    tenant_id: &TenantId,
    csv: &str,
) -> Result<IngestReport, IngestError> {
    let mut lines = csv.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());
    let (_, header_line) = lines.next().ok_or(IngestError::Empty)?;
    let columns = ColumnMap::from_header(&split_csv_line(header_line))?;

    let mut report = IngestReport::default();

    for (index, line) in lines {
        let row = split_csv_line(line);
        match build_product(&columns, &row, tenant_id) {
            Ok(mut product) => {
                if let Some(existing) =
                    products.find_by_sku(tenant_id, &product.sku).await?
                {
                    product.id = existing.id;
                }
                products.save(product).await?;
                report.applied += 1;
            }
            Err(reason) => {
                warn!(
                    event_name = "catalog_ingest_row_skipped",
                    row = index + 1,
                    reason = %reason,
                    "skipping malformed catalog row"
                );
                report.skipped += 1;
                report.errors.push(format!("row {}: {reason}", index + 1));
            }
        }
    }

    Ok(report)
}

fn build_product(
    columns: &ColumnMap,
    row: &[String],
    tenant_id: &TenantId,
) -> Result<Product, String> {
    let field = |index: usize| row.get(index).map(|value| value.trim()).unwrap_or("");
    let optional = |index: Option<usize>| {
        index.map(field).filter(|value| !value.is_empty()).map(str::to_owned)
    };

    let sku = field(columns.sku);
    if sku.is_empty() {
        return Err("sku is empty".to_owned());
    }
    let name = field(columns.name);
    if name.is_empty() {
        return Err("name is empty".to_owned());
    }

    let price = match optional(columns.price) {
        Some(raw) => {
            let value =
                Decimal::from_str(&raw).map_err(|_| format!("invalid price `{raw}`"))?;
            if value < Decimal::ZERO {
                return Err(format!("negative price `{raw}`"));
            }
            Some(value)
        }
        None => None,
    };

    let availability = match optional(columns.availability) {
        Some(raw) => Availability::parse(&raw.to_ascii_lowercase())
            .ok_or_else(|| format!("invalid availability `{raw}`"))?,
        None => Availability::Confirmed,
    };

    Ok(Product {
        id: ProductId(Uuid::new_v4().to_string()),
        tenant_id: tenant_id.clone(),
        sku: sku.to_owned(),
        name: name.to_owned(),
        description: optional(columns.description),
        price,
        unit: optional(columns.unit).unwrap_or_else(|| "piece".to_owned()),
        availability,
    })
}

/// Minimal CSV field splitter: handles double-quoted fields and escaped
/// quotes, which is all the owner spreadsheets export.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use vendy_core::domain::product::Availability;
    use vendy_core::domain::tenant::TenantId;

    use super::{ingest_catalog_csv, split_csv_line, IngestError};
    use crate::repositories::{InMemoryProductRepository, ProductRepository};

    fn tenant() -> TenantId {
        TenantId("t-1".to_string())
    }

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        assert_eq!(
            split_csv_line(r#"SND-01,"Sandwich, large","say ""hi""",5.00"#),
            vec!["SND-01", "Sandwich, large", "say \"hi\"", "5.00"],
        );
    }

    #[tokio::test]
    async fn good_rows_land_and_bad_rows_are_reported() {
        let products = InMemoryProductRepository::new();
        let csv = "sku,name,price,unit,availability\n\
                   SND-01,Sandwich,5.00,piece,confirmed\n\
                   ,Missing Sku,1.00,piece,confirmed\n\
                   JUI-01,Juice,not-a-price,glass,confirmed\n\
                   TEA-01,Tea,2.50,cup,out_of_stock\n";

        let report = ingest_catalog_csv(&products, &tenant(), csv).await.expect("ingest");
        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.errors.len(), 2);

        let listed = products.list_for_tenant(&tenant()).await.expect("list");
        assert_eq!(listed.len(), 2);
        let tea = listed.iter().find(|p| p.sku == "TEA-01").expect("tea exists");
        assert_eq!(tea.availability, Availability::OutOfStock);
    }

    #[tokio::test]
    async fn availability_defaults_to_confirmed() {
        let products = InMemoryProductRepository::new();
        let csv = "sku,name,price\nSND-01,Sandwich,5.00\n";

        ingest_catalog_csv(&products, &tenant(), csv).await.expect("ingest");
        let listed = products.list_for_tenant(&tenant()).await.expect("list");
        assert_eq!(listed[0].availability, Availability::Confirmed);
        assert_eq!(listed[0].price, Some(Decimal::new(500, 2)));
    }

    #[tokio::test]
    async fn reingestion_preserves_product_ids() {
        let products = InMemoryProductRepository::new();
        let csv = "sku,name,price\nSND-01,Sandwich,5.00\n";

        ingest_catalog_csv(&products, &tenant(), csv).await.expect("first pass");
        let first_id = products.list_for_tenant(&tenant()).await.expect("list")[0].id.clone();

        let updated = "sku,name,price\nSND-01,Sandwich Deluxe,6.00\n";
        ingest_catalog_csv(&products, &tenant(), updated).await.expect("second pass");

        let listed = products.list_for_tenant(&tenant()).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first_id);
        assert_eq!(listed[0].name, "Sandwich Deluxe");
    }

    #[tokio::test]
    async fn missing_required_column_fails_loud() {
        let products = InMemoryProductRepository::new();
        let csv = "name,price\nSandwich,5.00\n";

        let error = ingest_catalog_csv(&products, &tenant(), csv).await.unwrap_err();
        assert!(matches!(error, IngestError::MissingColumn("sku")));
    }
}
