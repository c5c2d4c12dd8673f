use std::time::Instant;

use crate::config::{RecordErrorPolicy, RefineSettings};
use crate::refine::error::RefineError;
use crate::refine::observer::{RefineEvent, RefineObserver};
use crate::refine::policy::SelectionPolicy;
use crate::refine::prompt::build_prompt;
use crate::refine::rotation::WorkingContext;
use crate::refine::types::{
    IterationRecord, ModelReply, Record, RecordResult, Rotation, StopReason,
};
use crate::responder::Responder;
use crate::store::ReferenceStore;

/// Per-record outcome of a table run, in input order.
pub type RecordOutcome = Result<RecordResult, RefineError>;

/// Drives the query/rotate loop for each record of a table.
///
/// Records are processed one after another, and so are the iterations within
/// a record. No state is carried from one record to the next.
pub struct Refiner<'a> {
    responder: &'a dyn Responder,
    store: &'a dyn ReferenceStore,
    settings: RefineSettings,
}

impl<'a> Refiner<'a> {
    pub fn new(
        responder: &'a dyn Responder,
        store: &'a dyn ReferenceStore,
        settings: RefineSettings,
    ) -> Result<Self, RefineError> {
        settings.validate()?;
        Ok(Self {
            responder,
            store,
            settings,
        })
    }

    pub fn settings(&self) -> RefineSettings {
        self.settings
    }

    /// Run the loop for one record.
    ///
    /// Responder failures are recorded and the loop continues. A prompt that
    /// cannot be built ends the record with an error and no partial result.
    pub async fn refine_record(
        &self,
        row: usize,
        total: usize,
        record: &Record,
        policy: &mut dyn SelectionPolicy,
        observer: &mut dyn RefineObserver,
    ) -> Result<RecordResult, RefineError> {
        let RefineSettings { max_iterations, k } = self.settings;
        let mut working = WorkingContext::new(&record.final_context_pmids, k);
        let mut iterations = Vec::with_capacity(max_iterations);

        observer.on_event(&RefineEvent::RowStarted { row, total, record });

        for iteration in 1..=max_iterations {
            let context = working.snapshot();
            observer.on_event(&RefineEvent::Context {
                iteration,
                context: &context,
            });

            let prompt = build_prompt(&record.subj_name, &record.obj_name, &context, self.store)?;
            observer.on_event(&RefineEvent::Prompt {
                iteration,
                max_iterations,
                prompt: &prompt,
            });

            let reply = self.ask(row, iteration, &prompt, observer).await;

            let rotation = if iteration < max_iterations {
                working.rotate(policy)?
            } else {
                Rotation::MaxIteration
            };

            let stop = match &rotation {
                Rotation::Exhausted { .. } => {
                    observer.on_event(&RefineEvent::Exhausted {
                        row,
                        rotation: &rotation,
                    });
                    Some(StopReason::StoppedEarly)
                }
                Rotation::MaxIteration => {
                    observer.on_event(&RefineEvent::ReachedLimit { row });
                    Some(StopReason::ReachedLimit)
                }
                Rotation::Swapped { .. } => {
                    observer.on_event(&RefineEvent::Rotated {
                        rotation: &rotation,
                    });
                    None
                }
            };

            iterations.push(IterationRecord {
                iteration,
                prompt,
                reply,
                context,
                rotation,
            });

            if let Some(stop) = stop {
                return Ok(RecordResult { iterations, stop });
            }
        }

        // the last iteration always yields MaxIteration
        unreachable!("refinement loop ended without a terminal rotation")
    }

    async fn ask(
        &self,
        row: usize,
        iteration: usize,
        prompt: &str,
        observer: &mut dyn RefineObserver,
    ) -> ModelReply {
        let start = Instant::now();
        match self.responder.respond(prompt).await {
            Ok(text) => {
                let elapsed = start.elapsed();
                observer.on_event(&RefineEvent::Response {
                    row,
                    iteration,
                    response: &text,
                    elapsed,
                });
                ModelReply::Answered { text, elapsed }
            }
            Err(err) => {
                let error = err.to_string();
                observer.on_event(&RefineEvent::ResponderFailed {
                    row,
                    iteration,
                    error: &error,
                });
                ModelReply::Failed { error }
            }
        }
    }

    /// Run every record in order.
    ///
    /// `records` holds one entry per input row; rows that could not be read
    /// as a [`Record`] come in as their error. With [`RecordErrorPolicy::Skip`]
    /// a record-level failure is reported and kept as an `Err` in the
    /// returned list. Anything else (store I/O, [`RecordErrorPolicy::Abort`])
    /// ends the run at that row.
    pub async fn refine_table(
        &self,
        records: Vec<Result<Record, RefineError>>,
        policy: &mut dyn SelectionPolicy,
        observer: &mut dyn RefineObserver,
        on_error: RecordErrorPolicy,
    ) -> Result<Vec<RecordOutcome>, RefineError> {
        let total = records.len();
        let mut outcomes = Vec::with_capacity(total);

        for (row, record) in records.into_iter().enumerate() {
            let outcome = match record {
                Ok(record) => {
                    self.refine_record(row, total, &record, policy, observer)
                        .await
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(result) => outcomes.push(Ok(result)),
                Err(err) => {
                    observer.on_event(&RefineEvent::RecordFailed { row, error: &err });
                    if on_error == RecordErrorPolicy::Skip && err.is_record_fatal() {
                        outcomes.push(Err(err));
                    } else {
                        return Err(RefineError::RecordFailed {
                            row,
                            source: Box::new(err),
                        });
                    }
                }
            }
        }

        Ok(outcomes)
    }
}
