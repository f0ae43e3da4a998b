use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use school_health_data::models::DrugRecord;
use school_health_data::repository::DrugRepositoryTrait;

use crate::entities::conversions;
use crate::entities::drug::{
    Drug, DrugAlerts, DrugImportSummary, DrugRequest, DEFAULT_EXPIRY_WINDOW_DAYS, DEFAULT_LOW_STOCK_THRESHOLD,
};
use crate::entities::InvalidRow;
use crate::errors::{invalid, ServiceError};
use crate::tabular::{self, parse_flexible_date, TabularRow};

const IMPORT_COLUMNS: [&str; 6] = ["drugName", "drugCode", "drugType", "drugUnit", "inventoryQuantity", "expiryDate"];

/// Drug inventory
pub struct DrugService {
    repository: Arc<dyn DrugRepositoryTrait + Send + Sync>,
}

impl DrugService {
    pub fn new(repository: Arc<dyn DrugRepositoryTrait + Send + Sync>) -> Self {
        Self { repository }
    }

    fn checked(request: DrugRequest) -> Result<DrugRequest, ServiceError> {
        let request = request.trimmed();
        request.validate()?;
        if request.inventory_quantity < 0 {
            return Err(invalid("inventory_quantity: Quantity cannot be negative"));
        }
        Ok(request)
    }

    pub async fn add_drug(&self, request: DrugRequest) -> Result<Drug, ServiceError> {
        let request = Self::checked(request)?;

        let record = DrugRecord {
            id: Uuid::new_v4().to_string(),
            image: request.image.filter(|i| !i.is_empty()),
            name: request.name,
            code: request.code,
            drug_type: request.drug_type,
            unit: request.unit,
            inventory_quantity: request.inventory_quantity,
            expiry_date: request.expiry_date,
            supplier_name: request.supplier_name,
            notes: request.notes,
            created_at: Utc::now(),
        };

        self.repository.create(&record).await?;
        info!("Added drug {} ({})", record.id, record.code);
        Ok(conversions::convert_to_domain_drug(record))
    }

    pub async fn list_drugs(&self) -> Result<Vec<Drug>, ServiceError> {
        Ok(self
            .repository
            .list()
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_drug)
            .collect())
    }

    /// Replace a drug's fields; the stored image is kept when none is given
    pub async fn update_drug(&self, id: &str, request: DrugRequest) -> Result<Drug, ServiceError> {
        let request = Self::checked(request)?;
        let mut record = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Drug {} not found", id)))?;

        record.name = request.name;
        record.code = request.code;
        record.drug_type = request.drug_type;
        record.unit = request.unit;
        record.inventory_quantity = request.inventory_quantity;
        record.expiry_date = request.expiry_date;
        record.supplier_name = request.supplier_name;
        record.notes = request.notes;
        if let Some(image) = request.image.filter(|i| !i.is_empty()) {
            record.image = Some(image);
        }

        self.repository.update(&record).await?;
        Ok(conversions::convert_to_domain_drug(record))
    }

    pub async fn delete_drug(&self, id: &str) -> Result<(), ServiceError> {
        self.repository.delete(id).await?;
        info!("Deleted drug {}", id);
        Ok(())
    }

    /// Import a sheet of drugs; one bad row rejects the whole file
    pub async fn import(&self, file_name: &str, bytes: &[u8]) -> Result<DrugImportSummary, ServiceError> {
        let rows = tabular::read_rows(file_name, bytes)?;

        let mut records = Vec::with_capacity(rows.len());
        let mut invalid_rows = Vec::new();
        for row in &rows {
            match parse_drug_row(row) {
                Ok(record) => records.push(record),
                Err(bad) => invalid_rows.push(bad),
            }
        }

        if !invalid_rows.is_empty() {
            return Err(ServiceError::InvalidImport {
                message: format!("{} rows have missing or invalid values", invalid_rows.len()),
                invalid_rows,
            });
        }

        let inserted_count = self.repository.insert_many(&records).await?;
        info!("Imported {} drugs", inserted_count);
        Ok(DrugImportSummary { total_rows: rows.len(), inserted_count })
    }

    /// Low-stock and expiring drugs; expired ones are always included
    pub async fn alerts(&self, threshold: Option<i64>, expiry_window_days: Option<i64>) -> Result<DrugAlerts, ServiceError> {
        let low_stock_threshold = threshold.filter(|t| *t >= 0).unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        let expiry_window_days = expiry_window_days.filter(|d| *d >= 0).unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS);
        let horizon = Utc::now().date_naive() + Duration::days(expiry_window_days);

        let low_stock = self.repository.low_stock(low_stock_threshold).await?;
        let expiring = self.repository.expiring_before(horizon).await?;

        Ok(DrugAlerts {
            low_stock_threshold,
            expiry_window_days,
            low_stock: low_stock.into_iter().map(conversions::convert_to_domain_drug).collect(),
            expiring: expiring.into_iter().map(conversions::convert_to_domain_drug).collect(),
        })
    }

    pub async fn count(&self) -> Result<i64, ServiceError> {
        Ok(self.repository.count().await?)
    }
}

fn parse_drug_row(row: &TabularRow) -> Result<DrugRecord, InvalidRow> {
    let mut missing: Vec<String> = IMPORT_COLUMNS
        .iter()
        .filter(|column| row.get(column).is_none())
        .map(|column| column.to_string())
        .collect();

    let quantity = row.number("inventoryQuantity").filter(|q| *q >= 0.0 && q.fract() == 0.0);
    if row.get("inventoryQuantity").is_some() && quantity.is_none() {
        missing.push("inventoryQuantity".to_string());
    }
    let expiry_date = row.get("expiryDate").and_then(parse_flexible_date);
    if row.get("expiryDate").is_some() && expiry_date.is_none() {
        missing.push("expiryDate".to_string());
    }

    match (quantity, expiry_date) {
        (Some(quantity), Some(expiry_date)) if missing.is_empty() => Ok(DrugRecord {
            id: Uuid::new_v4().to_string(),
            image: None,
            name: row.text("drugName"),
            code: row.text("drugCode"),
            drug_type: row.text("drugType"),
            unit: row.text("drugUnit"),
            inventory_quantity: quantity as i64,
            expiry_date,
            supplier_name: row.text("supplierName"),
            notes: row.text("notes"),
            created_at: Utc::now(),
        }),
        _ => Err(InvalidRow { row: row.line(), missing_fields: missing, student_id: None }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use school_health_data::database::create_in_memory_pool;
    use school_health_data::repository::DrugRepository;

    fn service() -> DrugService {
        DrugService::new(Arc::new(DrugRepository::new(create_in_memory_pool().unwrap())))
    }

    fn request(code: &str, quantity: i64, expiry: NaiveDate) -> DrugRequest {
        DrugRequest {
            name: "  Paracetamol ".to_string(),
            code: code.to_string(),
            drug_type: "tablet".to_string(),
            unit: "box".to_string(),
            inventory_quantity: quantity,
            expiry_date: expiry,
            supplier_name: String::new(),
            notes: String::new(),
            image: None,
        }
    }

    fn far_future() -> NaiveDate {
        Utc::now().date_naive() + Duration::days(400)
    }

    #[tokio::test]
    async fn test_add_trims_and_rejects_negative_stock() {
        let service = service();
        let drug = service.add_drug(request("PARA", 20, far_future())).await.unwrap();
        assert_eq!(drug.name, "Paracetamol");

        let err = service.add_drug(request("NEG", -1, far_future())).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let service = service();
        let drug = service.add_drug(request("PARA", 20, far_future())).await.unwrap();

        let updated = service.update_drug(&drug.id, request("PARA", 5, far_future())).await.unwrap();
        assert_eq!(updated.inventory_quantity, 5);
        assert_eq!(updated.created_at, drug.created_at);

        service.delete_drug(&drug.id).await.unwrap();
        assert!(matches!(
            service.update_drug(&drug.id, request("PARA", 5, far_future())).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_alerts() {
        let service = service();
        let today = Utc::now().date_naive();
        service.add_drug(request("LOW", 3, far_future())).await.unwrap();
        service.add_drug(request("SOON", 50, today + Duration::days(10))).await.unwrap();
        service.add_drug(request("GONE", 50, today - Duration::days(1))).await.unwrap();
        service.add_drug(request("FINE", 50, far_future())).await.unwrap();

        let alerts = service.alerts(None, None).await.unwrap();
        assert_eq!(alerts.low_stock_threshold, 10);
        let low: Vec<_> = alerts.low_stock.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(low, vec!["LOW"]);
        let expiring: Vec<_> = alerts.expiring.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(expiring, vec!["GONE", "SOON"]);
    }

    #[tokio::test]
    async fn test_import_accepts_date_formats() {
        let service = service();
        let csv = "drugName,drugCode,drugType,drugUnit,inventoryQuantity,expiryDate\n\
                   Paracetamol,P1,tablet,box,10,2027-01-31\n\
                   Vitamin C,V1,tablet,box,5,31/01/2027\n\
                   Saline,S1,liquid,bottle,7,46418\n";

        let summary = service.import("drugs.csv", csv.as_bytes()).await.unwrap();
        assert_eq!(summary, DrugImportSummary { total_rows: 3, inserted_count: 3 });
        assert_eq!(service.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_import_rejects_whole_file_on_bad_row() {
        let service = service();
        let csv = "drugName,drugCode,drugType,drugUnit,inventoryQuantity,expiryDate\n\
                   Paracetamol,P1,tablet,box,10,2027-01-31\n\
                   Broken,B1,tablet,,ten,someday\n";

        match service.import("drugs.csv", csv.as_bytes()).await.unwrap_err() {
            ServiceError::InvalidImport { invalid_rows, .. } => {
                assert_eq!(invalid_rows.len(), 1);
                assert_eq!(invalid_rows[0].row, 3);
                assert_eq!(
                    invalid_rows[0].missing_fields,
                    vec!["drugUnit".to_string(), "inventoryQuantity".to_string(), "expiryDate".to_string()]
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(service.count().await.unwrap(), 0);
    }
}
