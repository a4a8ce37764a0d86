// lib/src/clinic/service.rs

use std::sync::Arc;

use log::debug;

use crate::clinic::clock::{Clock, SystemClock};
use crate::clinic::inventory::InventoryLedger;
use crate::clinic::prescriptions::{NewPrescription, PrescriptionWorkflow};
use crate::clinic::settlement::{SettlementRequest, SettlementWorkflow};
use crate::clinic::visits::{ExaminationRequest, RegistrationReceipt, VisitSummary, VisitWorkflow};
use crate::config::StorageConfig;
use crate::storage_engine::ClinicStore;
use models::errors::ClinicResult;
use models::identifiers::{AccountId, MedicineId, PrescriptionId, QueueId, SettlementId, VisitId};
use models::medical::{
    Action, Actor, Examination, Medicine, MedicineUpdate, NewMedicine, Prescription, PrescriptionStatus,
    QueuePosition, QueueStatus, QueueTicket, Settlement, Visit,
};

/// Role-checked entry point to every clinic workflow.
///
/// Each call takes the resolved [`Actor`] and checks its permission before
/// the store is touched. Patients always act on their own records.
#[derive(Clone)]
pub struct ClinicService {
    store: ClinicStore,
    visits: VisitWorkflow,
    prescriptions: PrescriptionWorkflow,
    inventory: InventoryLedger,
    settlements: SettlementWorkflow,
}

impl ClinicService {
    pub fn new(store: ClinicStore, clock: Arc<dyn Clock>) -> Self {
        ClinicService {
            visits: VisitWorkflow::new(store.clone(), clock),
            prescriptions: PrescriptionWorkflow::new(store.clone()),
            inventory: InventoryLedger::new(store.clone()),
            settlements: SettlementWorkflow::new(store.clone()),
            store,
        }
    }

    pub fn open(config: &StorageConfig) -> ClinicResult<Self> {
        Ok(Self::new(ClinicStore::open(config)?, Arc::new(SystemClock)))
    }

    pub fn store(&self) -> &ClinicStore {
        &self.store
    }

    // --- Queue and visits ---

    pub fn next_queue_number(&self, actor: &Actor) -> ClinicResult<u32> {
        authorize(actor, Action::ViewQueue)?;
        Ok(self.visits.sequencer().next_queue_number())
    }

    pub fn register_self(&self, actor: &Actor, request: &ExaminationRequest) -> ClinicResult<RegistrationReceipt> {
        authorize(actor, Action::RegisterSelf)?;
        self.visits.register_self(actor.account_id, request)
    }

    pub fn register_for_patient(
        &self,
        actor: &Actor,
        patient_id: AccountId,
        complaint: &str,
    ) -> ClinicResult<RegistrationReceipt> {
        authorize(actor, Action::RegisterForPatient)?;
        self.visits.register_for_patient(actor.account_id, patient_id, complaint)
    }

    pub fn complete_visit(&self, actor: &Actor, visit_id: VisitId, exam: &Examination) -> ClinicResult<Visit> {
        authorize(actor, Action::CompleteVisit)?;
        self.visits.complete_visit(actor.account_id, visit_id, exam)
    }

    pub fn advance_queue(&self, actor: &Actor, queue_id: QueueId, next: QueueStatus) -> ClinicResult<QueueTicket> {
        authorize(actor, Action::AdvanceQueue)?;
        self.visits.advance_queue(queue_id, next)
    }

    pub fn todays_queue(&self, actor: &Actor) -> ClinicResult<Vec<QueuePosition>> {
        authorize(actor, Action::ViewQueue)?;
        self.visits.todays_queue()
    }

    pub fn todays_queue_all(&self, actor: &Actor) -> ClinicResult<Vec<QueueTicket>> {
        authorize(actor, Action::ViewQueue)?;
        self.visits.todays_queue_all()
    }

    pub fn pending_visits(&self, actor: &Actor) -> ClinicResult<Vec<Visit>> {
        authorize(actor, Action::ViewVisits)?;
        self.visits.pending_visits()
    }

    pub fn get_visit(&self, actor: &Actor, visit_id: VisitId) -> ClinicResult<Visit> {
        authorize(actor, Action::ViewVisits)?;
        self.visits.get_visit(visit_id)
    }

    /// Visits completed by the acting doctor.
    pub fn doctor_visits(&self, actor: &Actor) -> ClinicResult<Vec<Visit>> {
        authorize(actor, Action::ViewVisits)?;
        self.visits.doctor_visits(actor.account_id)
    }

    pub fn patient_queue_status(&self, actor: &Actor) -> ClinicResult<Option<QueuePosition>> {
        authorize(actor, Action::ViewOwnRecords)?;
        self.visits.patient_queue_status(actor.account_id)
    }

    pub fn patient_visits(&self, actor: &Actor) -> ClinicResult<Vec<VisitSummary>> {
        authorize(actor, Action::ViewOwnRecords)?;
        self.visits.patient_visits(actor.account_id)
    }

    /// Any patient's visit history with queue numbers and prescriptions,
    /// for clinical staff.
    pub fn patient_history(&self, actor: &Actor, patient_id: AccountId) -> ClinicResult<Vec<VisitSummary>> {
        authorize(actor, Action::ViewVisits)?;
        self.visits.patient_visits(patient_id)
    }

    // --- Prescriptions ---

    pub fn create_prescription(&self, actor: &Actor, request: &NewPrescription) -> ClinicResult<Prescription> {
        authorize(actor, Action::CreatePrescription)?;
        self.prescriptions.create(actor.account_id, request)
    }

    pub fn approve_prescription(&self, actor: &Actor, id: PrescriptionId) -> ClinicResult<Prescription> {
        authorize(actor, Action::ApprovePrescription)?;
        self.prescriptions.approve(actor.account_id, id)
    }

    pub fn reject_prescription(&self, actor: &Actor, id: PrescriptionId, reason: &str) -> ClinicResult<Prescription> {
        authorize(actor, Action::RejectPrescription)?;
        self.prescriptions.reject(actor.account_id, id, reason)
    }

    pub fn dispense_prescription(&self, actor: &Actor, id: PrescriptionId) -> ClinicResult<Prescription> {
        authorize(actor, Action::DispensePrescription)?;
        self.prescriptions.dispense(actor.account_id, id)
    }

    pub fn get_prescription(&self, actor: &Actor, id: PrescriptionId) -> ClinicResult<Prescription> {
        authorize(actor, Action::ViewPrescriptions)?;
        self.prescriptions.get(id)
    }

    pub fn list_prescriptions(
        &self,
        actor: &Actor,
        status: Option<PrescriptionStatus>,
    ) -> ClinicResult<Vec<Prescription>> {
        authorize(actor, Action::ViewPrescriptions)?;
        self.prescriptions.list(status)
    }

    /// Prescriptions written by the acting doctor.
    pub fn doctor_prescriptions(&self, actor: &Actor) -> ClinicResult<Vec<Prescription>> {
        authorize(actor, Action::ViewPrescriptions)?;
        self.prescriptions.doctor_prescriptions(actor.account_id)
    }

    // --- Inventory ---

    pub fn create_medicine(&self, actor: &Actor, new: NewMedicine) -> ClinicResult<Medicine> {
        authorize(actor, Action::ManageInventory)?;
        self.inventory.create_medicine(new)
    }

    pub fn update_medicine(&self, actor: &Actor, id: MedicineId, update: MedicineUpdate) -> ClinicResult<Medicine> {
        authorize(actor, Action::ManageInventory)?;
        self.inventory.update_medicine(id, update)
    }

    pub fn restock(&self, actor: &Actor, id: MedicineId, delta: i64) -> ClinicResult<Medicine> {
        authorize(actor, Action::ManageInventory)?;
        self.inventory.restock(id, delta)
    }

    pub fn get_medicine(&self, actor: &Actor, id: MedicineId) -> ClinicResult<Medicine> {
        authorize(actor, Action::ViewInventory)?;
        self.inventory.get_medicine(id)
    }

    pub fn list_medicines(&self, actor: &Actor) -> ClinicResult<Vec<Medicine>> {
        authorize(actor, Action::ViewInventory)?;
        self.inventory.list_medicines()
    }

    pub fn low_stock(&self, actor: &Actor) -> ClinicResult<Vec<Medicine>> {
        authorize(actor, Action::ViewInventory)?;
        self.inventory.low_stock()
    }

    // --- Settlement ---

    pub fn create_settlement(&self, actor: &Actor, request: &SettlementRequest) -> ClinicResult<Settlement> {
        authorize(actor, Action::SettleVisit)?;
        self.settlements.create_settlement(actor.account_id, request)
    }

    pub fn flag_pending_payment(&self, actor: &Actor, request: &SettlementRequest) -> ClinicResult<Settlement> {
        authorize(actor, Action::SettleVisit)?;
        self.settlements.flag_pending_payment(actor.account_id, request)
    }

    pub fn mark_paid(&self, actor: &Actor, id: SettlementId) -> ClinicResult<Settlement> {
        authorize(actor, Action::SettleVisit)?;
        self.settlements.mark_paid(actor.account_id, id)
    }

    pub fn pending_payments(&self, actor: &Actor) -> ClinicResult<Vec<Settlement>> {
        authorize(actor, Action::ViewSettlements)?;
        self.settlements.pending_payments()
    }

    pub fn settlement_history(&self, actor: &Actor) -> ClinicResult<Vec<Settlement>> {
        authorize(actor, Action::ViewSettlements)?;
        self.settlements.settlement_history()
    }

    pub fn unsettled_visits(&self, actor: &Actor) -> ClinicResult<Vec<Visit>> {
        authorize(actor, Action::ViewSettlements)?;
        self.settlements.unsettled_visits()
    }

    pub fn suggested_total(&self, actor: &Actor, visit_id: VisitId) -> ClinicResult<u64> {
        authorize(actor, Action::ViewSettlements)?;
        self.settlements.suggested_total(visit_id)
    }
}

fn authorize(actor: &Actor, action: Action) -> ClinicResult<()> {
    actor.authorize(action).map_err(|e| {
        debug!("Denied '{}' to {} acting as {}", action, actor.account_id, actor.role);
        e
    })
}
