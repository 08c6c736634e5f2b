use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use scheduling_cell::models::BookAppointmentRequest;
use scheduling_cell::services::booking::BookingService;

use crate::models::RecurrenceJob;

/// Fire-and-forget worker for bulk recurrence creation. Enqueue returns a
/// boolean acknowledgment only; there is no result channel back to the
/// caller. Cancellation of a batch is all-or-nothing at enqueue time.
#[derive(Clone)]
pub struct RecurrenceQueue {
    tx: mpsc::UnboundedSender<RecurrenceJob>,
}

impl RecurrenceQueue {
    /// Spawn the consumer task and hand back the producer handle.
    pub fn start(config: Arc<AppConfig>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<RecurrenceJob>();

        tokio::spawn(async move {
            info!("Recurrence worker started");
            while let Some(job) = rx.recv().await {
                process_job(&config, job).await;
            }
            info!("Recurrence worker stopped");
        });

        Self { tx }
    }

    pub fn enqueue(&self, job: RecurrenceJob) -> bool {
        let job_id = job.job_id;
        match self.tx.send(job) {
            Ok(()) => {
                debug!("Enqueued recurrence job {}", job_id);
                true
            }
            Err(e) => {
                warn!("Failed to enqueue recurrence job {}: {}", job_id, e);
                false
            }
        }
    }
}

/// Create one appointment per unbooked occurrence. Individual failures are
/// logged and skipped, not retried.
async fn process_job(config: &AppConfig, job: RecurrenceJob) {
    info!(
        "Creating recurring appointments for job {} ({} occurrences)",
        job.job_id,
        job.dates.len()
    );

    let booking_service = BookingService::new(config);
    let mut created = 0usize;
    let mut skipped = 0usize;

    for occurrence in &job.dates {
        if occurrence.booked {
            skipped += 1;
            continue;
        }

        let request = BookAppointmentRequest {
            patient: job.spec.patient,
            practitioner: Some(job.spec.practitioner),
            service_unit: job.spec.service_unit,
            appointment_date: occurrence.date,
            start_time: occurrence.from_time,
            end_time: Some(occurrence.to_time),
            duration_minutes: None,
            appointment_type: job.spec.appointment_type.clone(),
            notes: job.spec.notes.clone(),
        };

        match booking_service.book_appointment(request, None).await {
            Ok(appointment) => {
                created += 1;
                debug!(
                    "Created recurring appointment {} on {}",
                    appointment.id, occurrence.date
                );
            }
            Err(e) => {
                skipped += 1;
                warn!(
                    "Skipping recurrence occurrence {} for job {}: {}",
                    occurrence.date, job.job_id, e
                );
            }
        }
    }

    info!(
        "Recurrence job {} finished: {} created, {} skipped",
        job.job_id, created, skipped
    );
}
