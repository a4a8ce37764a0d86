// lib/src/clinic/visits.rs

use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sled::transaction::Transactional;

use crate::clinic::clock::Clock;
use crate::clinic::sequencer::QueueSequencer;
use crate::storage_engine::storage_utils::{abort, get_record, scan_records, tx_decode, tx_encode, TxResult};
use crate::storage_engine::ClinicStore;
use models::errors::{ClinicError, ClinicResult, Entity, ValidationError};
use models::identifiers::{AccountId, PrescriptionId, QueueId, VisitId};
use models::medical::{
    Examination, PatientProfile, PatientProfileUpdate, Prescription, QueuePosition, QueueStatus,
    QueueTicket, Visit, VisitStatus,
};

/// A patient's request to be examined today.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExaminationRequest {
    pub complaint: String,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
}

impl ExaminationRequest {
    fn profile_update(&self) -> PatientProfileUpdate {
        PatientProfileUpdate {
            medical_history: self.medical_history.clone(),
            blood_type: self.blood_type.clone(),
            emergency_contact: self.emergency_contact.clone(),
        }
    }
}

/// What a successful registration hands back to the patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub queue_id: QueueId,
    pub queue_number: u32,
    pub service_day: NaiveDate,
    pub visit_id: VisitId,
}

/// A visit as shown in a patient's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitSummary {
    pub visit: Visit,
    pub queue_number: Option<u32>,
    pub prescription: Option<Prescription>,
}

/// Registration, examination and the queue tickets tied to them.
#[derive(Clone)]
pub struct VisitWorkflow {
    store: ClinicStore,
    sequencer: QueueSequencer,
    clock: Arc<dyn Clock>,
}

impl VisitWorkflow {
    pub fn new(store: ClinicStore, clock: Arc<dyn Clock>) -> Self {
        let sequencer = QueueSequencer::new(store.queue_counters.clone(), clock.clone());
        Self { store, sequencer, clock }
    }

    pub fn sequencer(&self) -> &QueueSequencer {
        &self.sequencer
    }

    /// Self-service registration. Creates or fills in the patient profile
    /// from the request in the same transaction.
    pub fn register_self(
        &self,
        patient_id: AccountId,
        request: &ExaminationRequest,
    ) -> ClinicResult<RegistrationReceipt> {
        let profile = request.profile_update();
        self.register(patient_id, None, &request.complaint, Some(&profile))
    }

    /// Front-desk registration. The patient must already have a profile.
    pub fn register_for_patient(
        &self,
        receptionist_id: AccountId,
        patient_id: AccountId,
        complaint: &str,
    ) -> ClinicResult<RegistrationReceipt> {
        self.register(patient_id, Some(receptionist_id), complaint, None)
    }

    // Counter bump, ticket, visit and the active-ticket index commit together
    // or not at all.
    fn register(
        &self,
        patient_id: AccountId,
        receptionist_id: Option<AccountId>,
        complaint: &str,
        profile_update: Option<&PatientProfileUpdate>,
    ) -> ClinicResult<RegistrationReceipt> {
        let complaint = complaint.trim();
        if complaint.is_empty() {
            return Err(ValidationError::MissingField("complaint").into());
        }

        let queue_id = QueueId(self.store.generate_id()?);
        let visit_id = VisitId(self.store.generate_id()?);
        let day = self.clock.today();
        let now = self.clock.now();
        let patient_key = patient_id.to_key();
        let store = &self.store;

        let ticket = (
            &store.queue_counters,
            &store.queues,
            &store.visits,
            &store.active_queue_by_patient,
            &store.patients,
        )
            .transaction(|(counters, queues, visits, active, patients)| -> TxResult<QueueTicket> {
                if active.get(&patient_key[..])?.is_some() {
                    debug!("Patient {} already holds an active ticket", patient_id);
                    return abort(ClinicError::DuplicateActiveQueue(patient_id.to_string()));
                }

                let existing = patients.get(&patient_key[..])?;
                match (existing, profile_update) {
                    (Some(bytes), Some(update)) => {
                        let mut profile: PatientProfile = tx_decode(&bytes)?;
                        profile.apply(update.clone());
                        patients.insert(&patient_key[..], tx_encode(&profile)?)?;
                    }
                    (None, Some(update)) => {
                        let profile = PatientProfile::new(patient_id, update.clone());
                        patients.insert(&patient_key[..], tx_encode(&profile)?)?;
                    }
                    (Some(_), None) => {}
                    (None, None) => return abort(ClinicError::not_found(Entity::PatientProfile, patient_id)),
                }

                let queue_number = self.sequencer.take_next(counters, day)?;
                let ticket = QueueTicket {
                    id: queue_id,
                    queue_number,
                    service_day: day,
                    patient_id,
                    visit_id,
                    receptionist_id,
                    status: QueueStatus::Waiting,
                    created_at: now,
                    updated_at: now,
                };
                let visit = Visit {
                    id: visit_id,
                    patient_id,
                    doctor_id: None,
                    queue_id: Some(queue_id),
                    complaint: complaint.to_string(),
                    diagnosis: None,
                    notes: None,
                    status: VisitStatus::Pending,
                    created_at: now,
                    updated_at: now,
                    completed_at: None,
                };

                queues.insert(&queue_id.to_key()[..], tx_encode(&ticket)?)?;
                visits.insert(&visit_id.to_key()[..], tx_encode(&visit)?)?;
                active.insert(&patient_key[..], &queue_id.to_key()[..])?;
                Ok(ticket)
            })?;

        info!(
            "Registered patient {} as queue #{} on {} (ticket {}, visit {})",
            patient_id, ticket.queue_number, day, queue_id, visit_id
        );
        Ok(RegistrationReceipt {
            queue_id,
            queue_number: ticket.queue_number,
            service_day: day,
            visit_id,
        })
    }

    /// The doctor closes the examination. The linked ticket is forced to
    /// `done` in the same transaction, so a diagnosed visit is never seen
    /// with a live ticket.
    pub fn complete_visit(
        &self,
        doctor_id: AccountId,
        visit_id: VisitId,
        exam: &Examination,
    ) -> ClinicResult<Visit> {
        let store = &self.store;
        let visit_key = visit_id.to_key();

        let visit = (&store.visits, &store.queues, &store.active_queue_by_patient).transaction(
            |(visits, queues, active)| -> TxResult<Visit> {
                let Some(bytes) = visits.get(&visit_key[..])? else {
                    return abort(ClinicError::not_found(Entity::Visit, visit_id));
                };
                let mut visit: Visit = tx_decode(&bytes)?;
                if let Err(e) = visit.complete(doctor_id, exam.clone()) {
                    return abort(e);
                }
                visits.insert(&visit_key[..], tx_encode(&visit)?)?;

                if let Some(queue_id) = visit.queue_id {
                    let queue_key = queue_id.to_key();
                    if let Some(bytes) = queues.get(&queue_key[..])? {
                        let mut ticket: QueueTicket = tx_decode(&bytes)?;
                        if ticket.status.is_active() {
                            ticket.status = QueueStatus::Done;
                            ticket.updated_at = visit.updated_at;
                            queues.insert(&queue_key[..], tx_encode(&ticket)?)?;
                        }
                        release_active(active, &ticket)?;
                    }
                }
                Ok(visit)
            },
        )?;

        info!("Doctor {} completed visit {}", doctor_id, visit_id);
        Ok(visit)
    }

    /// Moves a ticket forward without touching its visit.
    pub fn advance_queue(&self, queue_id: QueueId, next: QueueStatus) -> ClinicResult<QueueTicket> {
        let store = &self.store;
        let queue_key = queue_id.to_key();

        let ticket = (&store.queues, &store.active_queue_by_patient).transaction(
            |(queues, active)| -> TxResult<QueueTicket> {
                let Some(bytes) = queues.get(&queue_key[..])? else {
                    return abort(ClinicError::not_found(Entity::Queue, queue_id));
                };
                let mut ticket: QueueTicket = tx_decode(&bytes)?;
                if let Err(e) = ticket.advance_to(next) {
                    return abort(e);
                }
                queues.insert(&queue_key[..], tx_encode(&ticket)?)?;
                if !ticket.status.is_active() {
                    release_active(active, &ticket)?;
                }
                Ok(ticket)
            },
        )?;

        info!("Queue ticket {} moved to {}", queue_id, ticket.status);
        Ok(ticket)
    }

    pub fn get_visit(&self, visit_id: VisitId) -> ClinicResult<Visit> {
        get_record(&self.store.visits, &visit_id.to_key())?
            .ok_or_else(|| ClinicError::not_found(Entity::Visit, visit_id))
    }

    pub fn get_ticket(&self, queue_id: QueueId) -> ClinicResult<QueueTicket> {
        get_record(&self.store.queues, &queue_id.to_key())?
            .ok_or_else(|| ClinicError::not_found(Entity::Queue, queue_id))
    }

    /// Today's waiting and called tickets with their place in line.
    pub fn todays_queue(&self) -> ClinicResult<Vec<QueuePosition>> {
        self.positions_for_day(self.clock.today())
    }

    /// Every ticket issued today, done ones included, by queue number.
    pub fn todays_queue_all(&self) -> ClinicResult<Vec<QueueTicket>> {
        self.tickets_for_day(self.clock.today())
    }

    /// The patient's live ticket, if any.
    pub fn patient_queue_status(&self, patient_id: AccountId) -> ClinicResult<Option<QueuePosition>> {
        let Some(raw) = self.store.active_queue_by_patient.get(patient_id.to_key())? else {
            return Ok(None);
        };
        let queue_id = QueueId::from_key(&raw)?;
        let ticket = self.get_ticket(queue_id)?;
        let position = self
            .positions_for_day(ticket.service_day)?
            .into_iter()
            .find(|p| p.ticket.id == queue_id);
        Ok(position)
    }

    /// Visits awaiting examination, oldest first.
    pub fn pending_visits(&self) -> ClinicResult<Vec<Visit>> {
        let visits: Vec<Visit> = scan_records(&self.store.visits)?;
        Ok(visits.into_iter().filter(|v| !v.is_done()).collect())
    }

    /// A patient's visits, newest first.
    pub fn patient_visits(&self, patient_id: AccountId) -> ClinicResult<Vec<VisitSummary>> {
        let visits: Vec<Visit> = scan_records(&self.store.visits)?;
        let mut summaries = Vec::new();
        for visit in visits.into_iter().rev().filter(|v| v.patient_id == patient_id) {
            let queue_number = match visit.queue_id {
                Some(queue_id) => get_record::<QueueTicket>(&self.store.queues, &queue_id.to_key())?
                    .map(|t| t.queue_number),
                None => None,
            };
            let prescription = match self.store.prescription_by_visit.get(visit.id.to_key())? {
                Some(raw) => {
                    let prescription_id = PrescriptionId::from_key(&raw)?;
                    get_record(&self.store.prescriptions, &prescription_id.to_key())?
                }
                None => None,
            };
            summaries.push(VisitSummary { visit, queue_number, prescription });
        }
        Ok(summaries)
    }

    /// Visits this doctor has completed, newest first.
    pub fn doctor_visits(&self, doctor_id: AccountId) -> ClinicResult<Vec<Visit>> {
        let visits: Vec<Visit> = scan_records(&self.store.visits)?;
        Ok(visits
            .into_iter()
            .rev()
            .filter(|v| v.doctor_id == Some(doctor_id))
            .collect())
    }

    fn tickets_for_day(&self, day: NaiveDate) -> ClinicResult<Vec<QueueTicket>> {
        let tickets: Vec<QueueTicket> = scan_records(&self.store.queues)?;
        let mut tickets: Vec<QueueTicket> = tickets.into_iter().filter(|t| t.service_day == day).collect();
        tickets.sort_by_key(|t| (t.queue_number, t.id));
        Ok(tickets)
    }

    fn positions_for_day(&self, day: NaiveDate) -> ClinicResult<Vec<QueuePosition>> {
        Ok(line_positions(self.tickets_for_day(day)?))
    }
}

// Drops the patient's active-ticket index entry if it still points at `ticket`.
fn release_active(
    active: &sled::transaction::TransactionalTree,
    ticket: &QueueTicket,
) -> TxResult<()> {
    let patient_key = ticket.patient_id.to_key();
    if let Some(current) = active.get(&patient_key[..])? {
        if current[..] == ticket.id.to_key()[..] {
            active.remove(&patient_key[..])?;
        }
    }
    Ok(())
}

/// Numbers the active tickets 1.. by queue number, ticket id breaking ties.
/// Ticket ids are allocated before the number is issued, so key order is not
/// line order.
pub fn line_positions(tickets: Vec<QueueTicket>) -> Vec<QueuePosition> {
    let mut active: Vec<QueueTicket> = tickets.into_iter().filter(|t| t.status.is_active()).collect();
    active.sort_by_key(|t| (t.queue_number, t.id));
    let total = active.len() as u32;
    let mut waiting_ahead = 0;
    active
        .into_iter()
        .enumerate()
        .map(|(idx, ticket)| {
            let ahead_count = waiting_ahead;
            if ticket.status == QueueStatus::Waiting {
                waiting_ahead += 1;
            }
            QueuePosition {
                ticket,
                position: idx as u32 + 1,
                ahead_count,
                total_in_queue: total,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinic::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use models::ErrorKind;

    fn workflow() -> VisitWorkflow {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()));
        VisitWorkflow::new(ClinicStore::temporary().unwrap(), clock)
    }

    fn request(complaint: &str) -> ExaminationRequest {
        ExaminationRequest { complaint: complaint.into(), ..Default::default() }
    }

    fn exam(diagnosis: &str) -> Examination {
        Examination { diagnosis: diagnosis.into(), ..Default::default() }
    }

    #[test]
    fn registration_creates_ticket_and_pending_visit() {
        let flow = workflow();
        let patient = AccountId::new();
        let receipt = flow.register_self(patient, &request("fever")).unwrap();

        assert_eq!(receipt.queue_number, 1);
        let visit = flow.get_visit(receipt.visit_id).unwrap();
        assert_eq!(visit.status, VisitStatus::Pending);
        assert_eq!(visit.diagnosis, None);
        assert_eq!(visit.queue_id, Some(receipt.queue_id));
        let ticket = flow.get_ticket(receipt.queue_id).unwrap();
        assert_eq!(ticket.status, QueueStatus::Waiting);
        assert_eq!(ticket.visit_id, receipt.visit_id);
    }

    #[test]
    fn second_active_ticket_is_rejected_and_nothing_is_written() {
        let flow = workflow();
        let patient = AccountId::new();
        flow.register_self(patient, &request("fever")).unwrap();

        let err = flow.register_self(patient, &request("cough")).unwrap_err();
        assert!(matches!(err, ClinicError::DuplicateActiveQueue(_)));
        assert_eq!(flow.todays_queue_all().unwrap().len(), 1);
        assert_eq!(flow.sequencer().next_queue_number(), 2);
    }

    #[test]
    fn blank_complaint_is_a_validation_error() {
        let err = workflow().register_self(AccountId::new(), &request("  ")).unwrap_err();
        assert_eq!(err, ClinicError::Validation(ValidationError::MissingField("complaint")));
    }

    #[test]
    fn front_desk_registration_needs_an_existing_profile() {
        let flow = workflow();
        let err = flow
            .register_for_patient(AccountId::new(), AccountId::new(), "headache")
            .unwrap_err();
        assert!(matches!(err, ClinicError::NotFound { entity: Entity::PatientProfile, .. }));
        assert!(flow.todays_queue_all().unwrap().is_empty());
    }

    #[test]
    fn self_registration_fills_the_profile() {
        let flow = workflow();
        let patient = AccountId::new();
        let mut req = request("fever");
        req.blood_type = Some("AB".into());
        flow.register_self(patient, &req).unwrap();

        let profile: PatientProfile = get_record(&flow.store.patients, &patient.to_key()).unwrap().unwrap();
        assert_eq!(profile.blood_type.as_deref(), Some("AB"));
    }

    #[test]
    fn completion_closes_the_ticket_and_frees_the_patient() {
        let flow = workflow();
        let patient = AccountId::new();
        let doctor = AccountId::new();
        let receipt = flow.register_self(patient, &request("fever")).unwrap();

        let visit = flow.complete_visit(doctor, receipt.visit_id, &exam("flu")).unwrap();
        assert_eq!(visit.status, VisitStatus::Done);
        assert_eq!(visit.diagnosis.as_deref(), Some("flu"));
        assert_eq!(visit.doctor_id, Some(doctor));
        assert_eq!(flow.get_ticket(receipt.queue_id).unwrap().status, QueueStatus::Done);
        assert!(flow.patient_queue_status(patient).unwrap().is_none());

        let again = flow.register_self(patient, &request("follow-up")).unwrap();
        assert_eq!(again.queue_number, 2);
    }

    #[test]
    fn completion_without_diagnosis_changes_nothing() {
        let flow = workflow();
        let receipt = flow.register_self(AccountId::new(), &request("fever")).unwrap();

        let err = flow.complete_visit(AccountId::new(), receipt.visit_id, &exam(" ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(flow.get_visit(receipt.visit_id).unwrap().status, VisitStatus::Pending);
        assert_eq!(flow.get_ticket(receipt.queue_id).unwrap().status, QueueStatus::Waiting);
    }

    #[test]
    fn completing_unknown_or_finished_visits_fails() {
        let flow = workflow();
        let err = flow.complete_visit(AccountId::new(), VisitId(999), &exam("flu")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let receipt = flow.register_self(AccountId::new(), &request("fever")).unwrap();
        flow.complete_visit(AccountId::new(), receipt.visit_id, &exam("flu")).unwrap();
        let err = flow.complete_visit(AccountId::new(), receipt.visit_id, &exam("flu")).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidTransition { entity: Entity::Visit, .. }));
    }

    #[test]
    fn queue_advances_forward_only() {
        let flow = workflow();
        let patient = AccountId::new();
        let receipt = flow.register_self(patient, &request("fever")).unwrap();

        flow.advance_queue(receipt.queue_id, QueueStatus::Called).unwrap();
        let err = flow.advance_queue(receipt.queue_id, QueueStatus::Waiting).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        flow.advance_queue(receipt.queue_id, QueueStatus::Done).unwrap();

        // The visit is untouched and the patient may queue again.
        assert_eq!(flow.get_visit(receipt.visit_id).unwrap().status, VisitStatus::Pending);
        assert!(flow.register_self(patient, &request("back again")).is_ok());
    }

    #[test]
    fn positions_count_only_active_tickets() {
        let flow = workflow();
        let a = flow.register_self(AccountId::new(), &request("a")).unwrap();
        let b = flow.register_self(AccountId::new(), &request("b")).unwrap();
        let c_patient = AccountId::new();
        flow.register_self(c_patient, &request("c")).unwrap();

        flow.advance_queue(a.queue_id, QueueStatus::Done).unwrap();
        flow.advance_queue(b.queue_id, QueueStatus::Called).unwrap();

        let status = flow.patient_queue_status(c_patient).unwrap().unwrap();
        assert_eq!(status.ticket.queue_number, 3);
        assert_eq!(status.position, 2);
        assert_eq!(status.ahead_count, 0);
        assert_eq!(status.total_in_queue, 2);
        assert_eq!(flow.todays_queue().unwrap().len(), 2);
        assert_eq!(flow.todays_queue_all().unwrap().len(), 3);
    }

    #[test]
    fn line_follows_queue_number_not_ticket_id() {
        let flow = workflow();
        let a = flow.register_self(AccountId::new(), &request("a")).unwrap();
        let b = flow.register_self(AccountId::new(), &request("b")).unwrap();
        let mut first = flow.get_ticket(a.queue_id).unwrap();
        let mut second = flow.get_ticket(b.queue_id).unwrap();
        // A ticket whose id was allocated early but numbered late.
        first.queue_number = 7;
        second.queue_number = 3;

        let line = line_positions(vec![first, second]);
        assert_eq!(line[0].ticket.id, b.queue_id);
        assert_eq!(line[0].position, 1);
        assert_eq!(line[1].ticket.id, a.queue_id);
        assert_eq!(line[1].ahead_count, 1);
    }

    #[test]
    fn histories_are_scoped_to_their_owner() {
        let flow = workflow();
        let patient = AccountId::new();
        let doctor = AccountId::new();
        let receipt = flow.register_self(patient, &request("fever")).unwrap();
        flow.register_self(AccountId::new(), &request("other")).unwrap();
        flow.complete_visit(doctor, receipt.visit_id, &exam("flu")).unwrap();

        let history = flow.patient_visits(patient).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].queue_number, Some(1));
        assert!(history[0].prescription.is_none());
        assert_eq!(flow.doctor_visits(doctor).unwrap().len(), 1);
        assert_eq!(flow.pending_visits().unwrap().len(), 1);
    }
}
