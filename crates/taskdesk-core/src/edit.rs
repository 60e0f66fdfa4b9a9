use taskdesk_shared::{
  TaskEnvelope,
  TaskId
};
use tracing::{
  debug,
  warn
};

/// Inline edit of a single task. The
/// edited values live in the task list;
/// the session keeps what they were when
/// editing started.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
  open: Option<Snapshot>
}

#[derive(Debug, Clone)]
struct Snapshot {
  task_id: TaskId,
  old:     TaskEnvelope
}

impl EditSession {
  pub fn current(&self) -> Option<TaskId> {
    self
      .open
      .as_ref()
      .map(|snapshot| snapshot.task_id)
  }

  pub fn is_editing(
    &self,
    task_id: TaskId
  ) -> bool {
    self.current() == Some(task_id)
  }

  pub fn original(
    &self
  ) -> Option<&TaskEnvelope> {
    self
      .open
      .as_ref()
      .map(|snapshot| &snapshot.old)
  }

  /// Restores any open session, then
  /// snapshots `task_id`. Returns false
  /// when the task is not in `tasks`.
  pub fn begin(
    &mut self,
    tasks: &mut [TaskEnvelope],
    task_id: TaskId
  ) -> bool {
    self.cancel(tasks);

    let Some(envelope) = tasks
      .iter()
      .find(|t| t.id() == task_id)
    else {
      warn!(
        task_id,
        "cannot edit task that is not \
         loaded"
      );
      return false;
    };

    self.open = Some(Snapshot {
      task_id,
      old: envelope.clone()
    });
    debug!(task_id, "edit session opened");
    true
  }

  /// Puts the snapshot back over the
  /// edited task and closes the session.
  /// Does nothing when no session is
  /// open.
  pub fn cancel(
    &mut self,
    tasks: &mut [TaskEnvelope]
  ) {
    let Some(snapshot) = self.open.take()
    else {
      return;
    };

    match tasks
      .iter_mut()
      .find(|t| t.id() == snapshot.task_id)
    {
      | Some(envelope) => {
        envelope.task = snapshot.old.task;
        envelope.auth_user =
          snapshot.old.auth_user;
        debug!(
          task_id = snapshot.task_id,
          "edit session cancelled"
        );
      }
      | None => {
        debug!(
          task_id = snapshot.task_id,
          "edited task no longer loaded; \
           nothing to restore"
        );
      }
    }
  }

  /// Closes the session keeping the
  /// edited values.
  pub fn commit(&mut self) {
    if let Some(snapshot) =
      self.open.take()
    {
      debug!(
        task_id = snapshot.task_id,
        "edit session committed"
      );
    }
  }
}
