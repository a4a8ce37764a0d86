// lib/tests/clinic_lifecycle.rs
//
// End-to-end runs of the queue → visit → prescription → settlement lifecycle
// against a temporary sled database.

use std::sync::Arc;
use std::thread;

use chrono::{TimeZone, Utc};
use lib::{ClinicService, ClinicStore, ExaminationRequest, FixedClock, NewPrescription, SettlementRequest};
use models::medical::{
    Actor, Examination, NewMedicine, NewPrescriptionItem, PaymentMethod, PrescriptionStatus, QueueStatus, Role,
    VisitStatus,
};
use models::{AccountId, ClinicError, ErrorKind, MedicineId, PrescriptionId, VisitId};

struct Clinic {
    service: ClinicService,
    doctor: Actor,
    pharmacist: Actor,
    cashier: Actor,
    receptionist: Actor,
}

fn clinic() -> Clinic {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()));
    Clinic {
        service: ClinicService::new(ClinicStore::temporary().unwrap(), clock),
        doctor: Actor::new(AccountId::new(), Role::Doctor),
        pharmacist: Actor::new(AccountId::new(), Role::Pharmacist),
        cashier: Actor::new(AccountId::new(), Role::Cashier),
        receptionist: Actor::new(AccountId::new(), Role::Receptionist),
    }
}

fn patient() -> Actor {
    Actor::new(AccountId::new(), Role::Patient)
}

fn complaint(text: &str) -> ExaminationRequest {
    ExaminationRequest { complaint: text.into(), ..Default::default() }
}

fn diagnosis(text: &str) -> Examination {
    Examination { diagnosis: text.into(), ..Default::default() }
}

impl Clinic {
    fn medicine(&self, name: &str, stock: u32) -> MedicineId {
        self.service
            .create_medicine(
                &self.pharmacist,
                NewMedicine { name: name.into(), dosage: None, stock, unit_price: 1_000, min_stock: 0 },
            )
            .unwrap()
            .id
    }

    fn examined_visit(&self) -> VisitId {
        let receipt = self.service.register_self(&patient(), &complaint("fever")).unwrap();
        self.service
            .complete_visit(&self.doctor, receipt.visit_id, &diagnosis("flu"))
            .unwrap();
        receipt.visit_id
    }

    fn approved_prescription(&self, items: &[(MedicineId, u32)]) -> PrescriptionId {
        let visit_id = self.examined_visit();
        let request = NewPrescription {
            visit_id,
            items: items
                .iter()
                .map(|&(medicine_id, quantity)| NewPrescriptionItem {
                    medicine_id,
                    quantity,
                    instruction: "2x daily".into(),
                })
                .collect(),
            notes: None,
        };
        let prescription = self.service.create_prescription(&self.doctor, &request).unwrap();
        self.service.approve_prescription(&self.pharmacist, prescription.id).unwrap();
        prescription.id
    }

    fn stock(&self, id: MedicineId) -> u32 {
        self.service.get_medicine(&self.pharmacist, id).unwrap().stock
    }
}

#[test]
fn scenario_1_consecutive_registrations_get_consecutive_numbers() {
    let clinic = clinic();
    let a = clinic.service.register_self(&patient(), &complaint("fever")).unwrap();
    let b = clinic.service.register_self(&patient(), &complaint("headache")).unwrap();

    assert_eq!(a.queue_number, 1);
    assert_eq!(b.queue_number, 2);
    let visit = clinic.service.get_visit(&clinic.doctor, a.visit_id).unwrap();
    assert_eq!(visit.status, VisitStatus::Pending);
}

#[test]
fn scenario_2_completion_cascades_to_the_ticket() {
    let clinic = clinic();
    let patient = patient();
    let receipt = clinic.service.register_self(&patient, &complaint("fever")).unwrap();

    let visit = clinic
        .service
        .complete_visit(&clinic.doctor, receipt.visit_id, &diagnosis("flu"))
        .unwrap();
    assert_eq!(visit.status, VisitStatus::Done);

    let tickets = clinic.service.todays_queue_all(&clinic.receptionist).unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].status, QueueStatus::Done);
    assert!(clinic.service.patient_queue_status(&patient).unwrap().is_none());
}

#[test]
fn scenario_3_prescription_on_pending_visit_is_refused() {
    let clinic = clinic();
    let x = clinic.medicine("X", 10);
    let receipt = clinic.service.register_self(&patient(), &complaint("fever")).unwrap();

    let request = NewPrescription {
        visit_id: receipt.visit_id,
        items: vec![NewPrescriptionItem { medicine_id: x, quantity: 1, instruction: String::new() }],
        notes: None,
    };
    let err = clinic.service.create_prescription(&clinic.doctor, &request).unwrap_err();
    assert!(matches!(err, ClinicError::InvalidTransition { .. }));
    assert!(clinic.service.list_prescriptions(&clinic.pharmacist, None).unwrap().is_empty());
}

#[test]
fn scenario_4_insufficient_stock_leaves_every_medicine_untouched() {
    let clinic = clinic();
    let x = clinic.medicine("Medicine X", 3);
    let y = clinic.medicine("Medicine Y", 10);
    let id = clinic.approved_prescription(&[(x, 5), (y, 2)]);

    let err = clinic.service.dispense_prescription(&clinic.pharmacist, id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert!(err.to_string().contains("Medicine X"));
    assert_eq!(clinic.stock(x), 3);
    assert_eq!(clinic.stock(y), 10);
}

#[test]
fn scenario_5_dispense_decrements_stock() {
    let clinic = clinic();
    let x = clinic.medicine("X", 10);
    let id = clinic.approved_prescription(&[(x, 2)]);

    let prescription = clinic.service.dispense_prescription(&clinic.pharmacist, id).unwrap();
    assert_eq!(prescription.status, PrescriptionStatus::Dispensed);
    assert_eq!(clinic.stock(x), 8);
}

#[test]
fn scenario_6_second_settlement_is_a_conflict() {
    let clinic = clinic();
    let visit_id = clinic.examined_visit();
    let request = SettlementRequest { visit_id, amount: 50_000, method: PaymentMethod::Cash };

    clinic.service.create_settlement(&clinic.cashier, &request).unwrap();
    let err = clinic.service.create_settlement(&clinic.cashier, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(clinic.service.settlement_history(&clinic.cashier).unwrap().len(), 1);
}

#[test]
fn concurrent_registrations_of_one_patient_leave_one_active_ticket() {
    let clinic = clinic();
    let patient = patient();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = clinic.service.clone();
            thread::spawn(move || service.register_self(&patient, &complaint(&format!("attempt {i}"))))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, ClinicError::DuplicateActiveQueue(_)));
    }
    let active = clinic.service.todays_queue(&clinic.receptionist).unwrap();
    assert_eq!(active.len(), 1);
}

#[test]
fn concurrent_registrations_never_share_a_number() {
    let clinic = clinic();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = clinic.service.clone();
            thread::spawn(move || service.register_self(&patient(), &complaint("cough")).unwrap().queue_number)
        })
        .collect();
    let mut numbers: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    numbers.sort_unstable();

    assert_eq!(numbers, (1..=10).collect::<Vec<u32>>());
}

#[test]
fn concurrent_registrations_line_up_by_queue_number() {
    let clinic = clinic();
    let patients: Vec<Actor> = (0..24).map(|_| patient()).collect();

    let handles: Vec<_> = patients
        .iter()
        .map(|&patient| {
            let service = clinic.service.clone();
            thread::spawn(move || service.register_self(&patient, &complaint("cough")).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let line = clinic.service.todays_queue(&clinic.doctor).unwrap();
    assert_eq!(line.len(), 24);
    for (rank, entry) in line.iter().enumerate() {
        assert_eq!(entry.ticket.queue_number, rank as u32 + 1);
        assert_eq!(entry.position, rank as u32 + 1);
        assert_eq!(entry.ahead_count, rank as u32);
    }
    for patient in &patients {
        let status = clinic.service.patient_queue_status(patient).unwrap().unwrap();
        assert_eq!(status.position, status.ticket.queue_number);
    }
}

#[test]
fn queue_status_never_regresses() {
    let clinic = clinic();
    let receipt = clinic.service.register_self(&patient(), &complaint("fever")).unwrap();
    let queue_id = receipt.queue_id;

    let mut observed = vec![QueueStatus::Waiting];
    for next in [QueueStatus::Called, QueueStatus::Waiting, QueueStatus::Done, QueueStatus::Called] {
        if let Ok(ticket) = clinic.service.advance_queue(&clinic.receptionist, queue_id, next) {
            observed.push(ticket.status);
        }
    }
    assert_eq!(observed, vec![QueueStatus::Waiting, QueueStatus::Called, QueueStatus::Done]);
}

#[test]
fn completion_racing_a_queue_call_always_ends_done() {
    for _ in 0..10 {
        let clinic = clinic();
        let receipt = clinic.service.register_self(&patient(), &complaint("fever")).unwrap();

        let doctor_service = clinic.service.clone();
        let doctor = clinic.doctor;
        let completing = thread::spawn(move || {
            doctor_service.complete_visit(&doctor, receipt.visit_id, &diagnosis("flu"))
        });
        let calling_service = clinic.service.clone();
        let receptionist = clinic.receptionist;
        let calling = thread::spawn(move || {
            calling_service.advance_queue(&receptionist, receipt.queue_id, QueueStatus::Called)
        });

        completing.join().unwrap().unwrap();
        let _ = calling.join().unwrap();

        let visit = clinic.service.get_visit(&clinic.doctor, receipt.visit_id).unwrap();
        let ticket = &clinic.service.todays_queue_all(&clinic.receptionist).unwrap()[0];
        assert_eq!(visit.status, VisitStatus::Done);
        assert_eq!(ticket.status, QueueStatus::Done);
    }
}

#[test]
fn concurrent_dispenses_never_overdraw_stock() {
    let clinic = clinic();
    let x = clinic.medicine("X", 10);
    let y = clinic.medicine("Y", 100);
    let ids: Vec<PrescriptionId> = (0..8).map(|_| clinic.approved_prescription(&[(y, 1), (x, 3)])).collect();

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let service = clinic.service.clone();
            let pharmacist = clinic.pharmacist;
            thread::spawn(move || service.dispense_prescription(&pharmacist, id))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let dispensed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(dispensed, 3);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }
    assert_eq!(clinic.stock(x), 1);
    // Failed dispenses took nothing from the medicine that was in stock.
    assert_eq!(clinic.stock(y), 97);
}

#[test]
fn concurrent_cashiers_create_one_settlement() {
    let clinic = clinic();
    let visit_id = clinic.examined_visit();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let service = clinic.service.clone();
            let cashier = Actor::new(AccountId::new(), Role::Cashier);
            thread::spawn(move || {
                let request = SettlementRequest { visit_id, amount: 10_000 + i, method: PaymentMethod::Ewallet };
                service.create_settlement(&cashier, &request)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(clinic.service.settlement_history(&clinic.cashier).unwrap().len(), 1);
    assert!(clinic.service.unsettled_visits(&clinic.cashier).unwrap().is_empty());
}

#[test]
fn front_desk_registration_records_the_receptionist() {
    let clinic = clinic();
    let patient = patient();
    // A self-registration creates the profile the front desk needs later.
    let first = clinic.service.register_self(&patient, &complaint("fever")).unwrap();
    clinic
        .service
        .complete_visit(&clinic.doctor, first.visit_id, &diagnosis("flu"))
        .unwrap();

    let receipt = clinic
        .service
        .register_for_patient(&clinic.receptionist, patient.account_id, "check-up")
        .unwrap();
    let tickets = clinic.service.todays_queue(&clinic.receptionist).unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].ticket.id, receipt.queue_id);
    assert_eq!(tickets[0].ticket.receptionist_id, Some(clinic.receptionist.account_id));
    assert_eq!(clinic.service.patient_visits(&patient).unwrap().len(), 2);
}
