// lib/src/clinic/prescriptions.rs

use std::collections::BTreeMap;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sled::transaction::Transactional;

use crate::storage_engine::storage_utils::{abort, get_record, scan_records, tx_decode, tx_encode, TxResult};
use crate::storage_engine::ClinicStore;
use models::errors::{ClinicError, ClinicResult, Entity};
use models::identifiers::{AccountId, MedicineId, PrescriptionId, PrescriptionItemId, VisitId};
use models::medical::{
    validate_items, Medicine, NewPrescriptionItem, Prescription, PrescriptionItem, PrescriptionStatus, Visit,
};

/// A doctor's prescription as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrescription {
    pub visit_id: VisitId,
    pub items: Vec<NewPrescriptionItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Prescription lifecycle: creation by the doctor, then the pharmacist's
/// approve / reject / dispense decisions.
#[derive(Clone)]
pub struct PrescriptionWorkflow {
    store: ClinicStore,
}

impl PrescriptionWorkflow {
    pub fn new(store: ClinicStore) -> Self {
        Self { store }
    }

    /// Attaches a prescription to a completed visit. One per visit.
    pub fn create(&self, doctor_id: AccountId, request: &NewPrescription) -> ClinicResult<Prescription> {
        validate_items(&request.items)?;

        let prescription_id = PrescriptionId(self.store.generate_id()?);
        let mut item_ids = Vec::with_capacity(request.items.len());
        for _ in &request.items {
            item_ids.push(PrescriptionItemId(self.store.generate_id()?));
        }
        let visit_id = request.visit_id;
        let visit_key = visit_id.to_key();
        let now = Utc::now();
        let store = &self.store;

        let prescription = (
            &store.visits,
            &store.medicines,
            &store.prescriptions,
            &store.prescription_by_visit,
        )
            .transaction(|(visits, medicines, prescriptions, by_visit)| -> TxResult<Prescription> {
                let Some(bytes) = visits.get(&visit_key[..])? else {
                    return abort(ClinicError::not_found(Entity::Visit, visit_id));
                };
                let visit: Visit = tx_decode(&bytes)?;
                if !visit.is_done() || visit.diagnosis.is_none() {
                    return abort(ClinicError::invalid_transition(Entity::Visit, visit.status, "prescribed"));
                }
                if by_visit.get(&visit_key[..])?.is_some() {
                    return abort(ClinicError::DuplicatePrescription(visit_id.to_string()));
                }

                let mut items = Vec::with_capacity(request.items.len());
                for (item, id) in request.items.iter().zip(&item_ids) {
                    if medicines.get(&item.medicine_id.to_key()[..])?.is_none() {
                        return abort(ClinicError::not_found(Entity::Medicine, item.medicine_id));
                    }
                    items.push(PrescriptionItem {
                        id: *id,
                        medicine_id: item.medicine_id,
                        quantity: item.quantity,
                        instruction: item.instruction.trim().to_string(),
                    });
                }

                let prescription = Prescription {
                    id: prescription_id,
                    visit_id,
                    doctor_id,
                    pharmacist_id: None,
                    status: PrescriptionStatus::Pending,
                    notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
                    rejection_reason: None,
                    items,
                    created_at: now,
                    updated_at: now,
                };
                prescriptions.insert(&prescription_id.to_key()[..], tx_encode(&prescription)?)?;
                by_visit.insert(&visit_key[..], &prescription_id.to_key()[..])?;
                Ok(prescription)
            })?;

        info!(
            "Doctor {} prescribed {} item(s) for visit {} (prescription {})",
            doctor_id,
            prescription.items.len(),
            visit_id,
            prescription_id
        );
        Ok(prescription)
    }

    /// pending → approved. Stock is not checked until dispense.
    pub fn approve(&self, pharmacist_id: AccountId, id: PrescriptionId) -> ClinicResult<Prescription> {
        let prescription = self.modify(id, |p| p.approve(pharmacist_id))?;
        info!("Pharmacist {} approved prescription {}", pharmacist_id, id);
        Ok(prescription)
    }

    /// pending → rejected, keeping the reason as the prescription's notes.
    pub fn reject(&self, pharmacist_id: AccountId, id: PrescriptionId, reason: &str) -> ClinicResult<Prescription> {
        let prescription = self.modify(id, |p| p.reject(pharmacist_id, reason))?;
        info!("Pharmacist {} rejected prescription {}", pharmacist_id, id);
        Ok(prescription)
    }

    /// approved → dispensed, taking every item out of stock.
    ///
    /// All lines are checked before any stock moves; one short line aborts
    /// the whole dispense with `InsufficientStock` and nothing changes. The
    /// check and the decrements run in one serializable transaction, so
    /// concurrent dispenses cannot overdraw a medicine.
    pub fn dispense(&self, pharmacist_id: AccountId, id: PrescriptionId) -> ClinicResult<Prescription> {
        let key = id.to_key();
        let store = &self.store;

        let (prescription, touched) = (&store.prescriptions, &store.medicines).transaction(
            |(prescriptions, medicines)| -> TxResult<(Prescription, Vec<Medicine>)> {
                let Some(bytes) = prescriptions.get(&key[..])? else {
                    return abort(ClinicError::not_found(Entity::Prescription, id));
                };
                let mut prescription: Prescription = tx_decode(&bytes)?;
                if let Err(e) = prescription.ensure_dispensable() {
                    return abort(e);
                }

                let mut wanted: BTreeMap<MedicineId, u32> = BTreeMap::new();
                for item in &prescription.items {
                    let total = wanted.entry(item.medicine_id).or_insert(0);
                    *total = total.saturating_add(item.quantity);
                }

                let mut updated = Vec::with_capacity(wanted.len());
                for (medicine_id, quantity) in &wanted {
                    let Some(bytes) = medicines.get(&medicine_id.to_key()[..])? else {
                        return abort(ClinicError::not_found(Entity::Medicine, medicine_id));
                    };
                    let mut medicine: Medicine = tx_decode(&bytes)?;
                    if medicine.stock < *quantity {
                        return abort(ClinicError::InsufficientStock {
                            medicine_id: medicine_id.to_string(),
                            medicine_name: medicine.name.clone(),
                            requested: *quantity,
                            available: medicine.stock,
                        });
                    }
                    medicine.stock -= *quantity;
                    medicine.updated_at = Utc::now();
                    updated.push(medicine);
                }

                for medicine in &updated {
                    medicines.insert(&medicine.id.to_key()[..], tx_encode(medicine)?)?;
                }
                if let Err(e) = prescription.mark_dispensed(pharmacist_id) {
                    return abort(e);
                }
                prescriptions.insert(&key[..], tx_encode(&prescription)?)?;
                Ok((prescription, updated))
            },
        )?;

        info!("Pharmacist {} dispensed prescription {}", pharmacist_id, id);
        for medicine in touched.iter().filter(|m| m.is_low()) {
            warn!("Medicine {} is low after dispense: {} left", medicine.name, medicine.stock);
        }
        Ok(prescription)
    }

    pub fn get(&self, id: PrescriptionId) -> ClinicResult<Prescription> {
        get_record(&self.store.prescriptions, &id.to_key())?
            .ok_or_else(|| ClinicError::not_found(Entity::Prescription, id))
    }

    pub fn for_visit(&self, visit_id: VisitId) -> ClinicResult<Option<Prescription>> {
        match self.store.prescription_by_visit.get(visit_id.to_key())? {
            Some(raw) => {
                let id = PrescriptionId::from_key(&raw)?;
                get_record(&self.store.prescriptions, &id.to_key())
            }
            None => Ok(None),
        }
    }

    /// All prescriptions, optionally narrowed to one status, oldest first.
    pub fn list(&self, status: Option<PrescriptionStatus>) -> ClinicResult<Vec<Prescription>> {
        let all: Vec<Prescription> = scan_records(&self.store.prescriptions)?;
        Ok(all
            .into_iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect())
    }

    /// Prescriptions written by one doctor, newest first.
    pub fn doctor_prescriptions(&self, doctor_id: AccountId) -> ClinicResult<Vec<Prescription>> {
        let all: Vec<Prescription> = scan_records(&self.store.prescriptions)?;
        Ok(all.into_iter().rev().filter(|p| p.doctor_id == doctor_id).collect())
    }

    fn modify<F>(&self, id: PrescriptionId, change: F) -> ClinicResult<Prescription>
    where
        F: Fn(&mut Prescription) -> ClinicResult<()>,
    {
        let key = id.to_key();
        let prescription = self.store.prescriptions.transaction(|prescriptions| -> TxResult<Prescription> {
            let Some(bytes) = prescriptions.get(&key[..])? else {
                return abort(ClinicError::not_found(Entity::Prescription, id));
            };
            let mut prescription: Prescription = tx_decode(&bytes)?;
            if let Err(e) = change(&mut prescription) {
                return abort(e);
            }
            prescriptions.insert(&key[..], tx_encode(&prescription)?)?;
            Ok(prescription)
        })?;
        Ok(prescription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinic::clock::FixedClock;
    use crate::clinic::inventory::InventoryLedger;
    use crate::clinic::visits::{ExaminationRequest, VisitWorkflow};
    use chrono::TimeZone;
    use models::medical::{Examination, NewMedicine};
    use models::{ErrorKind, ValidationError};
    use std::sync::Arc;

    struct Fixture {
        visits: VisitWorkflow,
        inventory: InventoryLedger,
        prescriptions: PrescriptionWorkflow,
        doctor: AccountId,
        pharmacist: AccountId,
    }

    fn fixture() -> Fixture {
        let store = ClinicStore::temporary().unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()));
        Fixture {
            visits: VisitWorkflow::new(store.clone(), clock),
            inventory: InventoryLedger::new(store.clone()),
            prescriptions: PrescriptionWorkflow::new(store),
            doctor: AccountId::new(),
            pharmacist: AccountId::new(),
        }
    }

    impl Fixture {
        fn visit(&self, done: bool) -> VisitId {
            let receipt = self
                .visits
                .register_self(
                    AccountId::new(),
                    &ExaminationRequest { complaint: "fever".into(), ..Default::default() },
                )
                .unwrap();
            if done {
                let exam = Examination { diagnosis: "flu".into(), ..Default::default() };
                self.visits.complete_visit(self.doctor, receipt.visit_id, &exam).unwrap();
            }
            receipt.visit_id
        }

        fn medicine(&self, name: &str, stock: u32) -> MedicineId {
            self.inventory
                .create_medicine(NewMedicine {
                    name: name.into(),
                    dosage: None,
                    stock,
                    unit_price: 1_000,
                    min_stock: 0,
                })
                .unwrap()
                .id
        }

        fn prescribe(&self, visit_id: VisitId, items: &[(MedicineId, u32)]) -> ClinicResult<Prescription> {
            self.prescribe_with_notes(visit_id, items, None)
        }

        fn prescribe_with_notes(
            &self,
            visit_id: VisitId,
            items: &[(MedicineId, u32)],
            notes: Option<&str>,
        ) -> ClinicResult<Prescription> {
            let request = NewPrescription {
                visit_id,
                items: items
                    .iter()
                    .map(|(medicine_id, quantity)| NewPrescriptionItem {
                        medicine_id: *medicine_id,
                        quantity: *quantity,
                        instruction: "after meals".into(),
                    })
                    .collect(),
                notes: notes.map(str::to_string),
            };
            self.prescriptions.create(self.doctor, &request)
        }
    }

    #[test]
    fn pending_visit_cannot_be_prescribed() {
        let f = fixture();
        let x = f.medicine("X", 10);
        let visit = f.visit(false);

        let err = f.prescribe(visit, &[(x, 1)]).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidTransition { entity: Entity::Visit, .. }));
        assert!(f.prescriptions.list(None).unwrap().is_empty());
        assert!(f.prescriptions.for_visit(visit).unwrap().is_none());
    }

    #[test]
    fn items_are_validated_before_anything_is_written() {
        let f = fixture();
        let visit = f.visit(true);

        assert_eq!(f.prescribe(visit, &[]).unwrap_err(), ClinicError::EmptyPrescription);
        let x = f.medicine("X", 10);
        assert!(matches!(
            f.prescribe(visit, &[(x, 0)]).unwrap_err(),
            ClinicError::Validation(ValidationError::NonPositiveQuantity(_))
        ));
        let err = f.prescribe(visit, &[(MedicineId(4242), 1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(f.prescriptions.list(None).unwrap().is_empty());
    }

    #[test]
    fn one_prescription_per_visit() {
        let f = fixture();
        let x = f.medicine("X", 10);
        let visit = f.visit(true);
        f.prescribe(visit, &[(x, 1)]).unwrap();

        let err = f.prescribe(visit, &[(x, 2)]).unwrap_err();
        assert!(matches!(err, ClinicError::DuplicatePrescription(_)));
        assert_eq!(f.prescriptions.list(None).unwrap().len(), 1);
    }

    #[test]
    fn approve_then_dispense_moves_stock() {
        let f = fixture();
        let x = f.medicine("X", 10);
        let visit = f.visit(true);
        let p = f.prescribe(visit, &[(x, 2)]).unwrap();

        let err = f.prescriptions.dispense(f.pharmacist, p.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(f.inventory.get_medicine(x).unwrap().stock, 10);

        let approved = f.prescriptions.approve(f.pharmacist, p.id).unwrap();
        assert_eq!(approved.pharmacist_id, Some(f.pharmacist));
        let dispensed = f.prescriptions.dispense(f.pharmacist, p.id).unwrap();
        assert_eq!(dispensed.status, PrescriptionStatus::Dispensed);
        assert_eq!(f.inventory.get_medicine(x).unwrap().stock, 8);

        let err = f.prescriptions.dispense(f.pharmacist, p.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(f.inventory.get_medicine(x).unwrap().stock, 8);
    }

    #[test]
    fn short_line_aborts_the_whole_dispense() {
        let f = fixture();
        let x = f.medicine("X", 3);
        let y = f.medicine("Y", 10);
        let p = f.prescribe(f.visit(true), &[(x, 5), (y, 2)]).unwrap();
        f.prescriptions.approve(f.pharmacist, p.id).unwrap();

        match f.prescriptions.dispense(f.pharmacist, p.id).unwrap_err() {
            ClinicError::InsufficientStock { medicine_name, requested, available, .. } => {
                assert_eq!(medicine_name, "X");
                assert_eq!(requested, 5);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.inventory.get_medicine(x).unwrap().stock, 3);
        assert_eq!(f.inventory.get_medicine(y).unwrap().stock, 10);
        assert_eq!(f.prescriptions.get(p.id).unwrap().status, PrescriptionStatus::Approved);
    }

    #[test]
    fn repeated_lines_are_summed_against_stock() {
        let f = fixture();
        let x = f.medicine("X", 5);
        let p = f.prescribe(f.visit(true), &[(x, 3), (x, 3)]).unwrap();
        f.prescriptions.approve(f.pharmacist, p.id).unwrap();

        let err = f.prescriptions.dispense(f.pharmacist, p.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(f.inventory.get_medicine(x).unwrap().stock, 5);
    }

    #[test]
    fn reject_needs_a_reason_and_is_terminal() {
        let f = fixture();
        let x = f.medicine("X", 5);
        let p = f
            .prescribe_with_notes(f.visit(true), &[(x, 1)], Some("penicillin-free only"))
            .unwrap();

        let err = f.prescriptions.reject(f.pharmacist, p.id, "   ").unwrap_err();
        assert_eq!(err, ClinicError::Validation(ValidationError::MissingRejectionReason));

        let rejected = f.prescriptions.reject(f.pharmacist, p.id, "allergy on file").unwrap();
        assert_eq!(rejected.status, PrescriptionStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("allergy on file"));
        let stored = f.prescriptions.get(p.id).unwrap();
        assert_eq!(stored.notes.as_deref(), Some("penicillin-free only"));
        assert_eq!(stored.rejection_reason.as_deref(), Some("allergy on file"));
        assert!(f.prescriptions.approve(f.pharmacist, p.id).is_err());
        assert_eq!(f.prescriptions.list(Some(PrescriptionStatus::Rejected)).unwrap().len(), 1);
        assert!(f.prescriptions.list(Some(PrescriptionStatus::Pending)).unwrap().is_empty());
    }

    #[test]
    fn unknown_prescription_is_not_found() {
        let f = fixture();
        let err = f.prescriptions.approve(f.pharmacist, PrescriptionId(9)).unwrap_err();
        assert!(matches!(err, ClinicError::NotFound { entity: Entity::Prescription, .. }));
        assert_eq!(f.prescriptions.doctor_prescriptions(f.doctor).unwrap().len(), 0);
    }
}
