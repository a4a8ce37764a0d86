// lib/src/clinic/settlement.rs

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use sled::transaction::Transactional;

use crate::storage_engine::storage_utils::{abort, get_record, scan_records, tx_decode, tx_encode, TxResult};
use crate::storage_engine::ClinicStore;
use models::errors::{ClinicError, ClinicResult, Entity};
use models::identifiers::{AccountId, MedicineId, PrescriptionId, SettlementId, VisitId};
use models::medical::{
    Medicine, PaymentMethod, Prescription, PrescriptionStatus, Settlement, SettlementStatus, Visit,
};

/// A cashier's payment entry for one visit. `amount` is in minor currency
/// units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub visit_id: VisitId,
    pub amount: u64,
    #[serde(default)]
    pub method: PaymentMethod,
}

/// Binds exactly one payment record to each completed visit.
#[derive(Clone)]
pub struct SettlementWorkflow {
    store: ClinicStore,
}

impl SettlementWorkflow {
    pub fn new(store: ClinicStore) -> Self {
        Self { store }
    }

    /// Records a payment taken at the counter; the settlement is paid at once.
    pub fn create_settlement(&self, cashier_id: AccountId, request: &SettlementRequest) -> ClinicResult<Settlement> {
        self.insert(Some(cashier_id), request, SettlementStatus::Paid)
    }

    /// Records an amount owed but not yet collected.
    pub fn flag_pending_payment(&self, cashier_id: AccountId, request: &SettlementRequest) -> ClinicResult<Settlement> {
        self.insert(Some(cashier_id), request, SettlementStatus::Unpaid)
    }

    fn insert(
        &self,
        cashier_id: Option<AccountId>,
        request: &SettlementRequest,
        status: SettlementStatus,
    ) -> ClinicResult<Settlement> {
        let settlement_id = SettlementId(self.store.generate_id()?);
        let visit_id = request.visit_id;
        let visit_key = visit_id.to_key();
        let store = &self.store;

        let settlement = (&store.visits, &store.settlements, &store.settlement_by_visit).transaction(
            |(visits, settlements, by_visit)| -> TxResult<Settlement> {
                let Some(bytes) = visits.get(&visit_key[..])? else {
                    return abort(ClinicError::not_found(Entity::Visit, visit_id));
                };
                let visit: Visit = tx_decode(&bytes)?;
                if !visit.is_done() {
                    return abort(ClinicError::VisitNotSettleable(visit_id.to_string()));
                }
                if by_visit.get(&visit_key[..])?.is_some() {
                    return abort(ClinicError::DuplicateSettlement(visit_id.to_string()));
                }

                let now = Utc::now();
                let settlement = Settlement {
                    id: settlement_id,
                    patient_id: visit.patient_id,
                    visit_id,
                    cashier_id,
                    amount: request.amount,
                    method: request.method,
                    status,
                    created_at: now,
                    paid_at: (status == SettlementStatus::Paid).then_some(now),
                };
                settlements.insert(&settlement_id.to_key()[..], tx_encode(&settlement)?)?;
                by_visit.insert(&visit_key[..], &settlement_id.to_key()[..])?;
                Ok(settlement)
            },
        )?;

        info!(
            "Settlement {} for visit {} recorded as {} ({} via {})",
            settlement_id, visit_id, settlement.status, settlement.amount, settlement.method
        );
        Ok(settlement)
    }

    /// unpaid → paid.
    pub fn mark_paid(&self, cashier_id: AccountId, id: SettlementId) -> ClinicResult<Settlement> {
        let key = id.to_key();
        let settlement = self.store.settlements.transaction(|settlements| -> TxResult<Settlement> {
            let Some(bytes) = settlements.get(&key[..])? else {
                return abort(ClinicError::not_found(Entity::Settlement, id));
            };
            let mut settlement: Settlement = tx_decode(&bytes)?;
            if let Err(e) = settlement.mark_paid(cashier_id) {
                return abort(e);
            }
            settlements.insert(&key[..], tx_encode(&settlement)?)?;
            Ok(settlement)
        })?;
        info!("Cashier {} collected settlement {}", cashier_id, id);
        Ok(settlement)
    }

    pub fn get(&self, id: SettlementId) -> ClinicResult<Settlement> {
        get_record(&self.store.settlements, &id.to_key())?
            .ok_or_else(|| ClinicError::not_found(Entity::Settlement, id))
    }

    /// Settlements still awaiting payment, newest first.
    pub fn pending_payments(&self) -> ClinicResult<Vec<Settlement>> {
        let mut unpaid = self.with_status(SettlementStatus::Unpaid)?;
        unpaid.reverse();
        Ok(unpaid)
    }

    /// Paid settlements, newest first.
    pub fn settlement_history(&self) -> ClinicResult<Vec<Settlement>> {
        let mut paid = self.with_status(SettlementStatus::Paid)?;
        paid.reverse();
        Ok(paid)
    }

    /// Completed visits with no settlement yet.
    pub fn unsettled_visits(&self) -> ClinicResult<Vec<Visit>> {
        let visits: Vec<Visit> = scan_records(&self.store.visits)?;
        let mut out = Vec::new();
        for visit in visits.into_iter().filter(Visit::is_done) {
            if !self.store.settlement_by_visit.contains_key(visit.id.to_key())? {
                out.push(visit);
            }
        }
        Ok(out)
    }

    /// The cashier's default amount: quantity × current unit price over the
    /// visit's dispensed prescription, or 0 when nothing was dispensed.
    pub fn suggested_total(&self, visit_id: VisitId) -> ClinicResult<u64> {
        if !self.store.visits.contains_key(visit_id.to_key())? {
            return Err(ClinicError::not_found(Entity::Visit, visit_id));
        }
        let Some(raw) = self.store.prescription_by_visit.get(visit_id.to_key())? else {
            return Ok(0);
        };
        let prescription_id = PrescriptionId::from_key(&raw)?;
        let Some(prescription) = get_record::<Prescription>(&self.store.prescriptions, &prescription_id.to_key())? else {
            return Ok(0);
        };
        if prescription.status != PrescriptionStatus::Dispensed {
            return Ok(0);
        }

        let mut total: u64 = 0;
        for item in &prescription.items {
            let price = self.unit_price(item.medicine_id)?;
            total = total.saturating_add(price.saturating_mul(u64::from(item.quantity)));
        }
        Ok(total)
    }

    fn unit_price(&self, id: MedicineId) -> ClinicResult<u64> {
        get_record::<Medicine>(&self.store.medicines, &id.to_key())?
            .map(|m| m.unit_price)
            .ok_or_else(|| ClinicError::not_found(Entity::Medicine, id))
    }

    fn with_status(&self, status: SettlementStatus) -> ClinicResult<Vec<Settlement>> {
        let all: Vec<Settlement> = scan_records(&self.store.settlements)?;
        Ok(all.into_iter().filter(|s| s.status == status).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinic::clock::FixedClock;
    use crate::clinic::inventory::InventoryLedger;
    use crate::clinic::prescriptions::{NewPrescription, PrescriptionWorkflow};
    use crate::clinic::visits::{ExaminationRequest, VisitWorkflow};
    use chrono::TimeZone;
    use models::medical::{Examination, NewMedicine, NewPrescriptionItem};
    use models::ErrorKind;
    use std::sync::Arc;

    struct Fixture {
        store: ClinicStore,
        visits: VisitWorkflow,
        settlements: SettlementWorkflow,
        cashier: AccountId,
    }

    fn fixture() -> Fixture {
        let store = ClinicStore::temporary().unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()));
        Fixture {
            visits: VisitWorkflow::new(store.clone(), clock),
            settlements: SettlementWorkflow::new(store.clone()),
            store,
            cashier: AccountId::new(),
        }
    }

    impl Fixture {
        fn visit(&self, done: bool) -> VisitId {
            let receipt = self
                .visits
                .register_self(
                    AccountId::new(),
                    &ExaminationRequest { complaint: "cough".into(), ..Default::default() },
                )
                .unwrap();
            if done {
                let exam = Examination { diagnosis: "bronchitis".into(), ..Default::default() };
                self.visits.complete_visit(AccountId::new(), receipt.visit_id, &exam).unwrap();
            }
            receipt.visit_id
        }
    }

    fn request(visit_id: VisitId) -> SettlementRequest {
        SettlementRequest { visit_id, amount: 75_000, method: PaymentMethod::Transfer }
    }

    #[test]
    fn settles_a_done_visit_once() {
        let f = fixture();
        let visit = f.visit(true);

        let s = f.settlements.create_settlement(f.cashier, &request(visit)).unwrap();
        assert_eq!(s.status, SettlementStatus::Paid);
        assert_eq!(s.cashier_id, Some(f.cashier));
        assert!(s.paid_at.is_some());
        assert_eq!(s.patient_id, f.visits.get_visit(visit).unwrap().patient_id);

        let err = f.settlements.create_settlement(f.cashier, &request(visit)).unwrap_err();
        assert!(matches!(err, ClinicError::DuplicateSettlement(_)));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(f.settlements.settlement_history().unwrap().len(), 1);
    }

    #[test]
    fn pending_visit_is_not_settleable() {
        let f = fixture();
        let visit = f.visit(false);
        let err = f.settlements.create_settlement(f.cashier, &request(visit)).unwrap_err();
        assert!(matches!(err, ClinicError::VisitNotSettleable(_)));
        assert!(f.settlements.unsettled_visits().unwrap().is_empty());
    }

    #[test]
    fn unknown_visit_is_not_found() {
        let err = fixture().settlements.create_settlement(AccountId::new(), &request(VisitId(5))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pending_payment_can_be_collected_once() {
        let f = fixture();
        let visit = f.visit(true);

        let s = f.settlements.flag_pending_payment(f.cashier, &request(visit)).unwrap();
        assert_eq!(s.status, SettlementStatus::Unpaid);
        assert!(s.paid_at.is_none());
        assert_eq!(f.settlements.pending_payments().unwrap().len(), 1);
        assert!(f.settlements.unsettled_visits().unwrap().is_empty());

        let paid = f.settlements.mark_paid(f.cashier, s.id).unwrap();
        assert_eq!(paid.status, SettlementStatus::Paid);
        assert!(f.settlements.pending_payments().unwrap().is_empty());
        assert!(matches!(
            f.settlements.mark_paid(f.cashier, s.id).unwrap_err(),
            ClinicError::InvalidTransition { entity: Entity::Settlement, .. }
        ));
    }

    #[test]
    fn pending_payments_list_newest_first() {
        let f = fixture();
        let older = f.settlements.flag_pending_payment(f.cashier, &request(f.visit(true))).unwrap();
        let newer = f.settlements.flag_pending_payment(f.cashier, &request(f.visit(true))).unwrap();

        let ids: Vec<SettlementId> = f.settlements.pending_payments().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn unsettled_lists_done_visits_without_payment() {
        let f = fixture();
        let a = f.visit(true);
        let b = f.visit(true);
        f.visit(false);
        f.settlements.create_settlement(f.cashier, &request(a)).unwrap();

        let unsettled = f.settlements.unsettled_visits().unwrap();
        assert_eq!(unsettled.len(), 1);
        assert_eq!(unsettled[0].id, b);
    }

    #[test]
    fn suggested_total_prices_dispensed_items() {
        let f = fixture();
        let inventory = InventoryLedger::new(f.store.clone());
        let prescriptions = PrescriptionWorkflow::new(f.store.clone());
        let medicine = inventory
            .create_medicine(NewMedicine {
                name: "Cetirizine".into(),
                dosage: Some("10mg".into()),
                stock: 20,
                unit_price: 2_500,
                min_stock: 0,
            })
            .unwrap();
        let visit = f.visit(true);
        assert_eq!(f.settlements.suggested_total(visit).unwrap(), 0);

        let p = prescriptions
            .create(
                AccountId::new(),
                &NewPrescription {
                    visit_id: visit,
                    items: vec![NewPrescriptionItem { medicine_id: medicine.id, quantity: 4, instruction: String::new() }],
                    notes: None,
                },
            )
            .unwrap();
        assert_eq!(f.settlements.suggested_total(visit).unwrap(), 0);

        let pharmacist = AccountId::new();
        prescriptions.approve(pharmacist, p.id).unwrap();
        prescriptions.dispense(pharmacist, p.id).unwrap();
        assert_eq!(f.settlements.suggested_total(visit).unwrap(), 10_000);
    }
}
