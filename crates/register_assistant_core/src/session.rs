//! crates/register_assistant_core/src/session.rs
//!
//! The single owned state object behind one browser tab: the staged file, the
//! authoritative record list, and the incrementally revealed prefix of it.
//!
//! Every asynchronous continuation (preview, extraction result, reveal tick)
//! carries the [`Generation`] it was started under. Staging, triggering and
//! resetting bump the generation, so callbacks from an abandoned cycle are
//! recognized and dropped instead of mutating the new one.

use crate::domain::{FileKind, RecordId, StagedFile, StudentRecord, TrackedRecord};
use crate::error::{PipelineError, PipelineResult};
use crate::normalize::normalize_with_rng;
use crate::reveal::{Phase, RevealScheduler, Tick};
use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// The user-visible outcome of a finished cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The cycle succeeded but produced zero records.
    NoDataFound,
    Failed { reason: String },
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::NoDataFound => "No student data found in the uploaded file.".to_string(),
            Notice::Failed { reason } => format!("Processing failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedFileView {
    pub name: String,
    pub mime_type: String,
    pub size: usize,
    pub kind: Option<FileKind>,
}

/// A read-only snapshot handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub generation: Generation,
    pub phase: Phase,
    pub staged_file: Option<StagedFileView>,
    pub preview: Option<String>,
    pub total: Option<usize>,
    pub revealed_count: usize,
    pub cursor: Option<usize>,
    pub progress: u8,
    pub terminal: bool,
    pub can_trigger: bool,
    pub last_error: Option<String>,
    pub notice: Option<Notice>,
    pub revealed: Vec<TrackedRecord>,
}

#[derive(Debug, Default)]
pub struct Session {
    generation: Generation,
    staged: Option<StagedFile>,
    preview: Option<String>,
    records: Option<Vec<TrackedRecord>>,
    revealed: Vec<TrackedRecord>,
    scheduler: RevealScheduler,
    last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    //=====================================================================================
    // Mutators
    //=====================================================================================

    /// Stages a new file. Cancels whatever cycle was running and clears every
    /// derived field. Image files get a preview later via [`Session::apply_preview`].
    pub fn stage(&mut self, file: StagedFile) -> Generation {
        self.invalidate();
        info!(file = %file.name, mime_type = %file.mime_type, "File staged");
        self.staged = Some(file);
        self.generation
    }

    /// Stores a preview derived for the file staged under `generation`.
    pub fn apply_preview(&mut self, generation: Generation, preview: String) -> bool {
        if generation != self.generation || self.staged.is_none() {
            warn!("Dropping preview for a file that is no longer staged");
            return false;
        }
        self.preview = Some(preview);
        true
    }

    /// Starts a processing cycle for the staged file. Prior results are cleared
    /// but the staged file is kept.
    ///
    /// Fails fast, recording `last_error`, when nothing is staged or the file
    /// type has no ingestion path; no extraction or reveal is started then.
    pub fn begin_processing(&mut self) -> PipelineResult<(Generation, StagedFile)> {
        self.last_error = None;
        let Some(file) = self.staged.clone() else {
            let err = PipelineError::NoFileStaged;
            self.last_error = Some(err.to_string());
            return Err(err);
        };

        self.generation = self.generation.next();
        self.records = None;
        self.revealed.clear();
        self.scheduler.reset();

        if file.kind().is_none() {
            let err = PipelineError::UnsupportedType(file.type_label().to_string());
            self.fail(self.generation, err.clone());
            return Err(err);
        }

        self.scheduler.start();
        info!(file = %file.name, "Processing started");
        Ok((self.generation, file))
    }

    /// Applies the outcome of ingestion. Successful raw records are normalized
    /// here, in order, and become the source of truth.
    ///
    /// Returns `None` when the result belongs to an abandoned cycle.
    pub fn resolve_extraction<R: Rng + ?Sized>(
        &mut self,
        generation: Generation,
        result: PipelineResult<Vec<Value>>,
        today: NaiveDate,
        rng: &mut R,
    ) -> Option<Phase> {
        if generation != self.generation || self.scheduler.phase() != Phase::Extracting {
            warn!("Discarding extraction result from a cancelled cycle");
            return None;
        }

        match result {
            Ok(raw) => {
                let records: Vec<TrackedRecord> = raw
                    .iter()
                    .enumerate()
                    .map(|(index, item)| TrackedRecord {
                        id: RecordId::new(),
                        record: normalize_with_rng(item, index, today, rng),
                    })
                    .collect();
                let phase = self.scheduler.resolve(records.len());
                if records.is_empty() {
                    info!("Extraction finished with no records");
                } else {
                    info!(count = records.len(), "Extraction finished, revealing records");
                }
                self.records = Some(records);
                Some(phase)
            }
            Err(err) => {
                self.fail(generation, err);
                Some(Phase::Failed)
            }
        }
    }

    /// Ends the cycle started under `generation` with an error. The source list
    /// is left empty, not unset.
    pub fn fail(&mut self, generation: Generation, err: PipelineError) -> bool {
        if generation != self.generation {
            return false;
        }
        warn!("Processing failed: {}", err);
        self.last_error = Some(err.to_string());
        self.records = Some(Vec::new());
        self.revealed.clear();
        self.scheduler.fail();
        true
    }

    /// First half of a reveal tick: moves the cursor to the next record.
    pub fn begin_tick(&mut self, generation: Generation) -> Tick {
        if generation != self.generation {
            return Tick::Stale;
        }
        let total = self.total();
        self.scheduler.begin_tick(total)
    }

    /// Second half of a reveal tick, after the delay: appends the record under
    /// the cursor to the revealed list and returns it.
    pub fn finish_tick(&mut self, generation: Generation) -> Option<TrackedRecord> {
        if generation != self.generation {
            return None;
        }
        let index = self.scheduler.finish_tick(self.total())?;
        let record = self.records.as_ref()?.get(index)?.clone();
        self.revealed.push(record.clone());
        Some(record)
    }

    /// Replaces the record with `id` in both the source list and, if it has
    /// been revealed, the revealed list. The roll number is read-only once
    /// populated. Does not restart the reveal.
    pub fn edit_record(
        &mut self,
        id: RecordId,
        mut updated: StudentRecord,
    ) -> PipelineResult<TrackedRecord> {
        let source = self
            .records
            .as_mut()
            .and_then(|records| records.iter_mut().find(|tracked| tracked.id == id))
            .ok_or_else(|| PipelineError::RecordNotFound(format!("id {id}")))?;

        if !source.record.roll_number.is_empty() {
            updated.roll_number = source.record.roll_number.clone();
        }
        source.record = updated;
        let replaced = source.clone();

        if let Some(shown) = self.revealed.iter_mut().find(|tracked| tracked.id == id) {
            *shown = replaced.clone();
        }
        Ok(replaced)
    }

    /// Edits the record shown at `position` in the revealed list. The position
    /// is resolved to the record's id first, so the source list is updated by
    /// identity even if the two lists were ever ordered differently.
    pub fn edit_record_at(
        &mut self,
        position: usize,
        updated: StudentRecord,
    ) -> PipelineResult<TrackedRecord> {
        let id = self
            .revealed
            .get(position)
            .map(|tracked| tracked.id)
            .ok_or_else(|| PipelineError::RecordNotFound(format!("position {position}")))?;
        self.edit_record(id, updated)
    }

    /// Clears the staged file and all derived state.
    pub fn reset(&mut self) -> Generation {
        self.invalidate();
        self.staged = None;
        info!("Session reset");
        self.generation
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.next();
        self.preview = None;
        self.records = None;
        self.revealed.clear();
        self.scheduler.reset();
        self.last_error = None;
    }

    //=====================================================================================
    // Read-only views
    //=====================================================================================

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    pub fn staged(&self) -> Option<&StagedFile> {
        self.staged.as_ref()
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// The authoritative list; `None` until a cycle has resolved.
    pub fn source_records(&self) -> Option<&[TrackedRecord]> {
        self.records.as_deref()
    }

    pub fn revealed(&self) -> &[TrackedRecord] {
        &self.revealed
    }

    pub fn revealed_count(&self) -> usize {
        self.scheduler.revealed_count()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.scheduler.cursor()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }

    pub fn can_trigger(&self) -> bool {
        self.staged.is_some() && !self.phase().is_active()
    }

    /// The records exports operate on, in source order.
    pub fn export_records(&self) -> Vec<StudentRecord> {
        self.records
            .iter()
            .flatten()
            .map(|tracked| tracked.record.clone())
            .collect()
    }

    pub fn notice(&self) -> Option<Notice> {
        match self.phase() {
            Phase::Complete if self.total() == 0 && self.last_error.is_none() => {
                Some(Notice::NoDataFound)
            }
            Phase::Failed => Some(Notice::Failed {
                reason: self.last_error.clone().unwrap_or_default(),
            }),
            _ => None,
        }
    }

    pub fn view(&self) -> SessionView {
        let total = self.records.as_ref().map(Vec::len);
        SessionView {
            generation: self.generation,
            phase: self.phase(),
            staged_file: self.staged.as_ref().map(|file| StagedFileView {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                size: file.bytes.len(),
                kind: file.kind(),
            }),
            preview: self.preview.clone(),
            total,
            revealed_count: self.revealed_count(),
            cursor: self.cursor(),
            progress: self.scheduler.progress(total.unwrap_or(0)),
            terminal: self.is_terminal(),
            can_trigger: self.can_trigger(),
            last_error: self.last_error.clone(),
            notice: self.notice(),
            revealed: self.revealed.clone(),
        }
    }

    fn total(&self) -> usize {
        self.records.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    fn json_file(body: &str) -> StagedFile {
        StagedFile::new("roster.json", "application/json", body.to_string())
    }

    fn raw(names: &[&str]) -> Vec<Value> {
        names.iter().map(|name| json!({ "Name": name })).collect()
    }

    fn assert_invariants(session: &Session) {
        let source = session.source_records().unwrap_or_default();
        assert_eq!(session.revealed().len(), session.revealed_count());
        assert!(session.revealed_count() <= source.len());
        assert_eq!(session.revealed(), &source[..session.revealed_count()]);
        if session.is_terminal() {
            assert_eq!(session.cursor(), None);
            assert!(source.is_empty() || session.revealed_count() == source.len());
        }
    }

    /// Drives a session through every tick, checking invariants at each step.
    fn drain(session: &mut Session, generation: Generation) -> usize {
        let mut ticks = 0;
        loop {
            match session.begin_tick(generation) {
                Tick::Pending { index, .. } => {
                    assert_eq!(session.cursor(), Some(index));
                    assert_invariants(session);
                    assert!(session.finish_tick(generation).is_some());
                    assert_invariants(session);
                    ticks += 1;
                }
                Tick::Done { .. } => return ticks,
                Tick::Stale => panic!("live generation reported stale"),
            }
        }
    }

    #[test]
    fn full_cycle_reveals_prefixes_then_completes() {
        let mut session = Session::new();
        session.stage(json_file("[]"));
        let (generation, _) = session.begin_processing().unwrap();
        assert_eq!(session.phase(), Phase::Extracting);

        let phase = session.resolve_extraction(
            generation,
            Ok(raw(&["Ravi", "Asha", "Meera"])),
            today(),
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(phase, Some(Phase::Revealing));
        assert_eq!(drain(&mut session, generation), 3);
        assert_eq!(session.phase(), Phase::Complete);
        assert_invariants(&session);
        assert_eq!(session.notice(), None);
        assert_eq!(session.view().progress, 100);
    }

    #[test]
    fn empty_result_completes_with_no_data_notice() {
        let mut session = Session::new();
        session.stage(json_file("[]"));
        let (generation, _) = session.begin_processing().unwrap();
        let phase = session.resolve_extraction(generation, Ok(vec![]), today(), &mut StdRng::seed_from_u64(1));
        assert_eq!(phase, Some(Phase::Complete));
        assert_eq!(session.notice(), Some(Notice::NoDataFound));
        assert_eq!(session.last_error(), None);
        assert_invariants(&session);
    }

    #[test]
    fn trigger_without_file_fails_fast() {
        let mut session = Session::new();
        assert_eq!(session.begin_processing().unwrap_err(), PipelineError::NoFileStaged);
        assert_eq!(session.last_error(), Some("No file selected for processing."));
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn unsupported_type_fails_without_starting_a_cycle() {
        let mut session = Session::new();
        session.stage(StagedFile::new("essay.docx", "", "hello"));
        let err = session.begin_processing().unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedType(_)));
        assert_eq!(session.phase(), Phase::Failed);
        assert!(session.last_error().unwrap().contains("essay.docx"));
        assert!(session.revealed().is_empty());
    }

    #[test]
    fn extraction_error_fails_and_leaves_source_empty() {
        let mut session = Session::new();
        session.stage(StagedFile::new("scan.png", "image/png", vec![1, 2, 3]));
        let (generation, _) = session.begin_processing().unwrap();
        let err = PipelineError::ResponseFormat("not an array".into());
        session.resolve_extraction(generation, Err(err), today(), &mut StdRng::seed_from_u64(1));
        assert_eq!(session.phase(), Phase::Failed);
        assert_eq!(session.source_records(), Some(&[][..]));
        match session.notice() {
            Some(Notice::Failed { reason }) => assert!(reason.contains("not an array")),
            other => panic!("unexpected notice: {other:?}"),
        }
        assert!(session.notice().unwrap().message().starts_with("Processing failed: "));
    }

    #[test]
    fn staging_mid_reveal_cancels_the_old_cycle() {
        let mut session = Session::new();
        session.stage(json_file("[]"));
        let (old, _) = session.begin_processing().unwrap();
        session.resolve_extraction(old, Ok(raw(&["A", "B", "C"])), today(), &mut StdRng::seed_from_u64(1));
        session.begin_tick(old);
        session.finish_tick(old);
        assert!(matches!(session.begin_tick(old), Tick::Pending { index: 1, .. }));
        assert_eq!(session.cursor(), Some(1));

        session.stage(json_file("[{}]"));
        assert!(session.revealed().is_empty());
        assert_eq!(session.revealed_count(), 0);
        assert_eq!(session.source_records(), None);

        // The old cycle's deferred callbacks fire and change nothing.
        assert_eq!(session.finish_tick(old), None);
        assert_eq!(session.begin_tick(old), Tick::Stale);
        assert_eq!(
            session.resolve_extraction(old, Ok(raw(&["late"])), today(), &mut StdRng::seed_from_u64(1)),
            None
        );
        assert!(session.revealed().is_empty());
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn retrigger_discards_a_slow_extraction() {
        let mut session = Session::new();
        session.stage(json_file("[]"));
        let (slow, _) = session.begin_processing().unwrap();
        let (fresh, _) = session.begin_processing().unwrap();
        assert_ne!(slow, fresh);
        assert_eq!(
            session.resolve_extraction(slow, Ok(raw(&["stale"])), today(), &mut StdRng::seed_from_u64(1)),
            None
        );
        assert_eq!(
            session.resolve_extraction(fresh, Ok(raw(&["fresh"])), today(), &mut StdRng::seed_from_u64(1)),
            Some(Phase::Revealing)
        );
        assert_eq!(session.source_records().unwrap()[0].record.name, "fresh");
    }

    #[test]
    fn preview_applies_only_to_the_current_staging() {
        let mut session = Session::new();
        let first = session.stage(StagedFile::new("a.png", "image/png", vec![1]));
        let second = session.stage(StagedFile::new("b.png", "image/png", vec![2]));
        assert!(!session.apply_preview(first, "data:image/png;base64,AQ==".into()));
        assert!(session.apply_preview(second, "data:image/png;base64,Ag==".into()));
        assert_eq!(session.preview(), Some("data:image/png;base64,Ag=="));
    }

    #[test]
    fn edits_update_both_lists_and_keep_roll_number() {
        let mut session = Session::new();
        session.stage(json_file("[]"));
        let (generation, _) = session.begin_processing().unwrap();
        session.resolve_extraction(generation, Ok(raw(&["Ravi", "Asha"])), today(), &mut StdRng::seed_from_u64(1));
        drain(&mut session, generation);

        let mut updated = session.revealed()[1].record.clone();
        updated.name = "Asha Verma".into();
        updated.roll_number = "999".into();
        let edited = session.edit_record_at(1, updated).unwrap();

        assert_eq!(edited.record.name, "Asha Verma");
        assert_eq!(edited.record.roll_number, "002");
        assert_eq!(session.source_records().unwrap()[1], edited);
        assert_eq!(session.revealed()[1], edited);
        assert_eq!(session.export_records()[1].name, "Asha Verma");
        assert_invariants(&session);
        assert_eq!(session.phase(), Phase::Complete);
    }

    #[test]
    fn edit_before_reveal_is_carried_into_the_revealed_list() {
        let mut session = Session::new();
        session.stage(json_file("[]"));
        let (generation, _) = session.begin_processing().unwrap();
        session.resolve_extraction(generation, Ok(raw(&["Ravi", "Asha"])), today(), &mut StdRng::seed_from_u64(1));

        let pending = session.source_records().unwrap()[1].clone();
        let mut updated = pending.record.clone();
        updated.address = "4 Lake Road".into();
        session.edit_record(pending.id, updated).unwrap();

        drain(&mut session, generation);
        assert_eq!(session.revealed()[1].record.address, "4 Lake Road");
    }

    #[test]
    fn edit_of_unknown_record_is_rejected() {
        let mut session = Session::new();
        let record = crate::normalize::normalize(&json!({}), 0, today());
        assert!(matches!(
            session.edit_record(RecordId::new(), record.clone()),
            Err(PipelineError::RecordNotFound(_))
        ));
        assert!(matches!(session.edit_record_at(0, record), Err(PipelineError::RecordNotFound(_))));
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = Session::new();
        session.stage(json_file("[]"));
        let (generation, _) = session.begin_processing().unwrap();
        session.resolve_extraction(generation, Ok(raw(&["Ravi"])), today(), &mut StdRng::seed_from_u64(1));
        session.reset();
        let view = session.view();
        assert_eq!(view.staged_file, None);
        assert_eq!(view.phase, Phase::Idle);
        assert_eq!(view.total, None);
        assert!(!view.can_trigger);
        assert_eq!(session.finish_tick(generation), None);
    }
}
