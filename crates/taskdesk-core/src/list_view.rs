use std::collections::BTreeMap;

use anyhow::anyhow;
use taskdesk_shared::{
  AddCommentRequest,
  Comment,
  Identity,
  Task,
  TaskEnvelope,
  TaskId,
  User
};
use tracing::{
  debug,
  error,
  info,
  instrument,
  warn
};

use crate::api::TaskApi;
use crate::edit::EditSession;
use crate::filter::{
  FilterState,
  sort_tasks
};
use crate::search::UserSearch;

/// State behind the task list page:
/// loaded tasks under the active
/// filters, per-task comments, inline
/// editing and the signed-in user.
pub struct TaskListView<A> {
  api:             A,
  pub filters:     FilterState,
  /// Draft text of the next comment.
  pub new_comment: String,
  tasks:           Vec<TaskEnvelope>,
  comments:        BTreeMap<TaskId, Vec<Comment>>,
  users:           UserSearch,
  current_user:    Option<Identity>,
  current_manager: Option<Identity>,
  editing:         EditSession
}

impl<A> TaskListView<A>
where
  A: TaskApi
{
  pub fn new(api: A) -> Self {
    Self {
      api,
      filters: FilterState::default(),
      new_comment: String::new(),
      tasks: vec![],
      comments: BTreeMap::new(),
      users: UserSearch::default(),
      current_user: None,
      current_manager: None,
      editing: EditSession::default()
    }
  }

  pub fn api(&self) -> &A {
    &self.api
  }

  pub fn tasks(&self) -> &[TaskEnvelope] {
    &self.tasks
  }

  pub fn task(
    &self,
    task_id: TaskId
  ) -> Option<&TaskEnvelope> {
    self
      .tasks
      .iter()
      .find(|t| t.id() == task_id)
  }

  /// Mutable access for inline edits.
  pub fn task_mut(
    &mut self,
    task_id: TaskId
  ) -> Option<&mut Task> {
    self
      .tasks
      .iter_mut()
      .find(|t| t.id() == task_id)
      .map(|t| &mut t.task)
  }

  pub fn comments_for(
    &self,
    task_id: TaskId
  ) -> &[Comment] {
    self
      .comments
      .get(&task_id)
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  pub fn users(&self) -> &[User] {
    self.users.users()
  }

  pub fn current_user(
    &self
  ) -> Option<&Identity> {
    self.current_user.as_ref()
  }

  pub fn current_manager(
    &self
  ) -> Option<&Identity> {
    self.current_manager.as_ref()
  }

  pub fn editing(&self) -> Option<TaskId> {
    self.editing.current()
  }

  /// Initial loads, one after another:
  /// users, tasks, then the signed-in
  /// user. Every step runs; the first
  /// failure is returned.
  #[instrument(skip(self))]
  pub async fn mount(
    &mut self
  ) -> anyhow::Result<()> {
    info!("task list mounted");
    let users = self.get_users("").await;
    let tasks = self.load_tasks().await;
    let current =
      self.load_current_user().await;
    users.and(tasks).and(current)
  }

  /// Replaces the list with every task
  /// the user may see, sorts it, then
  /// fetches comments for each remaining
  /// task.
  #[instrument(skip(self))]
  pub async fn load_tasks(
    &mut self
  ) -> anyhow::Result<()> {
    let tasks = match self
      .api
      .get_tasks()
      .await
    {
      | Ok(tasks) => tasks,
      | Err(err) => {
        error!(error = %err, "error fetching tasks");
        return Err(err);
      }
    };
    self.replace_tasks(tasks);

    let ids: Vec<TaskId> = self
      .tasks
      .iter()
      .map(TaskEnvelope::id)
      .collect();
    self
      .comments
      .retain(|id, _| ids.contains(id));
    for task_id in ids {
      // one task's comments failing
      // leaves the rest
      if let Err(err) =
        self.get_comments(task_id).await
      {
        debug!(task_id, error = %err, "continuing after comment fetch failure");
      }
    }
    Ok(())
  }

  /// Asks the server for tasks matching
  /// the identity filters and sorts
  /// them.
  #[instrument(skip(self), fields(filters = ?self.filters))]
  pub async fn filter_task(
    &mut self
  ) -> anyhow::Result<()> {
    match self
      .api
      .filter_tasks(&self.filters)
      .await
    {
      | Ok(tasks) => {
        self.replace_tasks(tasks);
        Ok(())
      }
      | Err(err) => {
        error!(error = %err, "error fetching tasks");
        Err(err)
      }
    }
  }

  /// Resets the identity filters and
  /// reloads the full, unfiltered list.
  pub async fn clear_filter(
    &mut self
  ) -> anyhow::Result<()> {
    self.filters.reset_identity();
    self.load_tasks().await
  }

  pub fn sort_tasks(&mut self) {
    sort_tasks(&mut self.tasks, &self.filters);
  }

  fn replace_tasks(
    &mut self,
    tasks: Vec<TaskEnvelope>
  ) {
    if let Some(task_id) =
      self.editing.current()
    {
      warn!(
        task_id,
        "task list replaced during an \
         edit; dropping the edit"
      );
      self.editing.commit();
    }
    debug!(count = tasks.len(), "tasks loaded");
    self.tasks = tasks;
    self.sort_tasks();
  }

  /// Opens an edit of `task_id`,
  /// restoring any edit already open.
  pub fn edit_task(
    &mut self,
    task_id: TaskId
  ) -> bool {
    self.editing.begin(&mut self.tasks, task_id)
  }

  pub fn cancel_edit(&mut self) {
    self.editing.cancel(&mut self.tasks);
  }

  /// Sends the task as currently edited.
  /// Success closes the edit keeping the
  /// new values; failure leaves it open.
  #[instrument(skip(self))]
  pub async fn save_task(
    &mut self,
    task_id: TaskId
  ) -> anyhow::Result<()> {
    let envelope = self
      .task(task_id)
      .cloned()
      .ok_or_else(|| {
        anyhow!(
          "task {task_id} is not loaded"
        )
      })?;

    match self.api.save_task(&envelope).await
    {
      | Ok(_) => {
        info!(task_id, "task saved");
        if self.editing.is_editing(task_id)
        {
          self.editing.commit();
        }
        Ok(())
      }
      | Err(err) => {
        error!(task_id, error = %err, "error saving task");
        Err(err)
      }
    }
  }

  /// Whether the signed-in user may edit
  /// `envelope`: they are its assignee,
  /// or its creator is their manager. The
  /// server still decides.
  ///
  /// Ids are compared when the server
  /// sent user records. A server that only
  /// sends names is matched by display
  /// name; the assignee's name comes from
  /// the loaded user list.
  pub fn can_edit(
    &self,
    envelope: &TaskEnvelope
  ) -> bool {
    let Some(user) = &self.current_user
    else {
      return false;
    };
    let task = &envelope.task;
    let assignee_name = task
      .assigned_to
      .and_then(|id| {
        self.users().iter().find(|u| u.id == id)
      })
      .map(User::display_name);
    let assigned = user.is(
      task.assigned_to,
      assignee_name.as_deref()
    );
    let creator_name =
      envelope.auth_user.display();
    let from_manager = self
      .current_manager
      .as_ref()
      .is_some_and(|manager| {
        manager.is(
          task.created_by,
          Some(&creator_name)
        )
      });
    assigned || from_manager
  }

  /// Posts the draft comment on
  /// `task_id`. The draft is cleared on
  /// success; the task's comment list is
  /// not refreshed.
  #[instrument(skip(self))]
  pub async fn add_comment(
    &mut self,
    task_id: TaskId
  ) -> anyhow::Result<()> {
    let request = AddCommentRequest {
      task_id,
      body: self.new_comment.clone()
    };
    match self.api.add_comment(&request).await
    {
      | Ok(ack) => {
        info!(task_id, message = ?ack.message, "comment added");
        self.new_comment.clear();
        Ok(())
      }
      | Err(err) => {
        error!(task_id, error = %err, "error adding comment");
        Err(err)
      }
    }
  }

  /// Fetches comments of one task into
  /// that task's slot.
  #[instrument(skip(self))]
  pub async fn get_comments(
    &mut self,
    task_id: TaskId
  ) -> anyhow::Result<()> {
    match self.api.get_comments(task_id).await
    {
      | Ok(comments) => {
        self.apply_comments(task_id, comments);
        Ok(())
      }
      | Err(err) => {
        error!(task_id, error = %err, "error fetching comments");
        Err(err)
      }
    }
  }

  /// Stores a comment response under the
  /// task it was requested for.
  pub fn apply_comments(
    &mut self,
    task_id: TaskId,
    comments: Vec<Comment>
  ) {
    debug!(task_id, count = comments.len(), "comments loaded");
    self.comments.insert(task_id, comments);
  }

  pub async fn get_users(
    &mut self,
    query: &str
  ) -> anyhow::Result<()> {
    self.users.run(&self.api, query).await
  }

  /// Fetches the signed-in user and their
  /// manager, if any. A response without
  /// a manager keeps the one already
  /// known.
  #[instrument(skip(self))]
  pub async fn load_current_user(
    &mut self
  ) -> anyhow::Result<()> {
    match self.api.current_user().await {
      | Ok(current) => {
        debug!(
          user = %current.user.display_name(),
          manager = ?current.manager.as_ref().map(Identity::display_name),
          "current user loaded"
        );
        self.current_user = Some(current.user);
        if let Some(manager) = current.manager {
          self.current_manager = Some(manager);
        }
        Ok(())
      }
      | Err(err) => {
        error!(error = %err, "error fetching current user");
        Err(err)
      }
    }
  }

  /// Deletes a task on the server, then
  /// drops it and its comments locally.
  /// An edit of the task stays open when
  /// the server refuses.
  #[instrument(skip(self))]
  pub async fn delete_task(
    &mut self,
    task_id: TaskId
  ) -> anyhow::Result<()> {
    match self.api.delete_task(task_id).await
    {
      | Ok(_) => {
        info!(task_id, "task deleted");
        if self.editing.is_editing(task_id)
        {
          self.editing.commit();
        }
        self.tasks.retain(|t| t.id() != task_id);
        self.comments.remove(&task_id);
        Ok(())
      }
      | Err(err) => {
        error!(task_id, error = %err, "error deleting task");
        Err(err)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use taskdesk_shared::{
    Comment,
    Identity,
    Task,
    TaskStatus,
    User
  };

  use super::TaskListView;
  use crate::api::{
    ApiCall,
    Endpoint,
    MemoryTaskApi
  };
  use crate::filter::{
    SortOption,
    StatusOption
  };

  fn user(
    id: i64,
    first: &str,
    last: &str
  ) -> User {
    User {
      id,
      first_name: first.to_string(),
      last_name: last.to_string()
    }
  }

  fn task(
    id: i64,
    created_on: &str,
    created_by: i64,
    assigned_to: i64,
    status: TaskStatus
  ) -> Task {
    Task {
      id,
      title: format!("task {id}"),
      description: format!("about {id}"),
      deadline: None,
      status,
      assigned_to: Some(assigned_to),
      created_on: Some(created_on.to_string()),
      created_by: Some(created_by),
      modified_on: None,
      modified_by: None,
      extra: Default::default()
    }
  }

  fn view() -> TaskListView<MemoryTaskApi> {
    let api = MemoryTaskApi::new(user(1, "Ann", "Lee"))
      .with_user(user(2, "Bob", "Stone"))
      .with_manager(1, user(3, "Cara", "Moss"))
      .with_task(task(1, "2024-01-01", 1, 2, TaskStatus::Pending))
      .with_task(task(2, "2024-03-01", 2, 1, TaskStatus::Completed))
      .with_task(task(3, "2024-02-01", 3, 2, TaskStatus::Pending))
      .with_comment(1, "first on one")
      .with_comment(2, "first on two");
    TaskListView::new(api)
  }

  fn ids(
    view: &TaskListView<MemoryTaskApi>
  ) -> Vec<i64> {
    view.tasks().iter().map(|t| t.id()).collect()
  }

  fn bodies(comments: &[Comment]) -> Vec<&str> {
    comments.iter().map(|c| c.body.as_str()).collect()
  }

  #[tokio::test]
  async fn mount_loads_in_order() {
    let mut view = view();
    view.mount().await.expect("mount");

    let calls = view.api().calls();
    assert_eq!(calls[0], ApiCall::SearchUsers(String::new()));
    assert_eq!(calls[1], ApiCall::GetTasks);
    assert_eq!(calls.last(), Some(&ApiCall::CurrentUser));
    assert_eq!(view.users().len(), 3);
    assert_eq!(ids(&view), vec![2, 3, 1]);
    assert_eq!(view.current_user().and_then(Identity::id), Some(1));
    assert_eq!(view.current_manager().and_then(Identity::id), Some(3));
  }

  #[tokio::test]
  async fn comments_are_kept_per_task() {
    let mut view = view();
    view.load_tasks().await.expect("load");

    assert_eq!(bodies(view.comments_for(1)), vec!["first on one"]);
    assert_eq!(bodies(view.comments_for(2)), vec!["first on two"]);
    assert!(view.comments_for(3).is_empty());

    // a reply for task 2 landing before
    // the one for task 1 touches only its
    // own slot
    view.apply_comments(2, vec![]);
    view.get_comments(1).await.expect("comments");
    assert!(view.comments_for(2).is_empty());
    assert_eq!(bodies(view.comments_for(1)), vec!["first on one"]);
  }

  #[tokio::test]
  async fn failed_comment_fetch_does_not_abort_load() {
    let mut view = view();
    view.api().fail_next(Endpoint::GetComments);
    view.load_tasks().await.expect("load still succeeds");
    assert_eq!(ids(&view), vec![2, 3, 1]);
    // first fetch (task 2) failed, others landed
    assert!(view.comments_for(2).is_empty());
    assert_eq!(bodies(view.comments_for(1)), vec!["first on one"]);
  }

  #[tokio::test]
  async fn status_filter_sticks_until_reload() {
    let mut view = view();
    view.filters.status_option = StatusOption::Only(TaskStatus::Pending);
    view.load_tasks().await.expect("load");
    assert_eq!(ids(&view), vec![3, 1]);

    view.filters.status_option = StatusOption::All;
    view.filters.sort_option = SortOption::OldestCreate;
    view.sort_tasks();
    assert_eq!(ids(&view), vec![1, 3]);

    view.load_tasks().await.expect("reload");
    assert_eq!(ids(&view), vec![1, 3, 2]);
  }

  #[tokio::test]
  async fn filter_task_uses_filter_endpoint() {
    let mut view = view();
    view.filters.assigned_to_user = Some(2);
    view.filter_task().await.expect("filter");
    assert_eq!(ids(&view), vec![3, 1]);
    assert!(matches!(
      view.api().calls().last(),
      Some(ApiCall::FilterTasks(_))
    ));
  }

  // Clearing reloads through get_tasks, not
  // through filter_task with empty values.
  #[tokio::test]
  async fn clear_filter_reloads_unfiltered() {
    let mut view = view();
    view.filters.created_by_self = true;
    view.filters.sort_option = SortOption::OldestCreate;
    view.filter_task().await.expect("filter");
    assert_eq!(ids(&view), vec![1]);

    view.api().clear_calls();
    view.clear_filter().await.expect("clear");
    assert!(!view.filters.created_by_self);
    assert_eq!(view.filters.sort_option, SortOption::OldestCreate);
    assert_eq!(view.api().calls()[0], ApiCall::GetTasks);
    assert!(
      !view
        .api()
        .calls()
        .iter()
        .any(|c| matches!(c, ApiCall::FilterTasks(_)))
    );
    assert_eq!(ids(&view), vec![1, 3, 2]);
  }

  #[tokio::test]
  async fn editing_another_task_restores_the_first() {
    let mut view = view();
    view.load_tasks().await.expect("load");

    assert!(view.edit_task(1));
    if let Some(task) = view.task_mut(1) {
      task.title = "scribbled".to_string();
    }
    assert!(view.edit_task(2));
    assert_eq!(view.task(1).map(|t| t.task.title.as_str()), Some("task 1"));
    assert_eq!(view.editing(), Some(2));

    view.cancel_edit();
    view.cancel_edit();
    assert_eq!(view.editing(), None);
  }

  #[tokio::test]
  async fn save_success_keeps_edits_and_closes_session() {
    let mut view = view();
    view.load_tasks().await.expect("load");
    view.edit_task(3);
    if let Some(task) = view.task_mut(3) {
      task.status = TaskStatus::Acknowledged;
    }
    view.save_task(3).await.expect("save");

    assert_eq!(view.editing(), None);
    let stored = view.api().tasks();
    let saved = stored.iter().find(|t| t.id() == 3).expect("stored");
    assert_eq!(saved.task.status, TaskStatus::Acknowledged);
    assert_eq!(
      view.task(3).map(|t| t.task.status),
      Some(TaskStatus::Acknowledged)
    );
  }

  #[tokio::test]
  async fn save_failure_leaves_session_open() {
    let mut view = view();
    view.load_tasks().await.expect("load");
    view.edit_task(3);
    if let Some(task) = view.task_mut(3) {
      task.title = "draft".to_string();
    }
    view.api().fail_next(Endpoint::SaveTask);
    assert!(view.save_task(3).await.is_err());
    assert_eq!(view.editing(), Some(3));

    view.cancel_edit();
    assert_eq!(view.task(3).map(|t| t.task.title.as_str()), Some("task 3"));
  }

  #[tokio::test]
  async fn can_edit_matches_by_user_id() {
    let mut view = view();
    view.mount().await.expect("mount");
    let task = |id| view.task(id).cloned().expect("loaded");

    // assigned to Ann
    assert!(view.can_edit(&task(2)));
    // created by Ann's manager
    assert!(view.can_edit(&task(3)));
    // created by Ann, assigned to Bob
    assert!(!view.can_edit(&task(1)));
  }

  #[tokio::test]
  async fn can_edit_is_false_before_user_loads() {
    let mut view = view();
    view.load_tasks().await.expect("load");
    let envelope = view.task(2).cloned().expect("loaded");
    assert!(!view.can_edit(&envelope));
  }

  #[tokio::test]
  async fn add_comment_clears_draft_only_on_success() {
    let mut view = view();
    view.load_tasks().await.expect("load");

    view.new_comment = "looks good".to_string();
    view.api().fail_next(Endpoint::AddComment);
    assert!(view.add_comment(1).await.is_err());
    assert_eq!(view.new_comment, "looks good");

    view.add_comment(1).await.expect("comment");
    assert!(view.new_comment.is_empty());
    // not appended locally
    assert_eq!(view.comments_for(1).len(), 1);
    assert_eq!(view.api().comments_for(1).len(), 2);
  }

  #[tokio::test]
  async fn failed_load_keeps_previous_tasks() {
    let mut view = view();
    view.load_tasks().await.expect("load");
    view.api().fail_next(Endpoint::GetTasks);
    assert!(view.load_tasks().await.is_err());
    assert_eq!(ids(&view), vec![2, 3, 1]);
  }

  #[tokio::test]
  async fn delete_drops_task_and_comments() {
    let mut view = view();
    view.load_tasks().await.expect("load");
    view.edit_task(1);
    if let Some(task) = view.task_mut(1) {
      task.title = "doomed".to_string();
    }

    view.delete_task(1).await.expect("delete");
    assert_eq!(ids(&view), vec![2, 3]);
    assert!(view.comments_for(1).is_empty());
    assert_eq!(view.editing(), None);

    assert!(view.delete_task(2).await.is_err());
    assert_eq!(ids(&view), vec![2, 3]);
  }

  #[tokio::test]
  async fn refused_delete_keeps_the_open_edit() {
    let mut view = view();
    view.load_tasks().await.expect("load");
    assert!(view.edit_task(2));
    if let Some(task) = view.task_mut(2) {
      task.title = "half typed".to_string();
    }

    // created by Bob, Ann may not delete it
    assert!(view.delete_task(2).await.is_err());
    assert_eq!(view.editing(), Some(2));
    assert_eq!(
      view.task(2).map(|t| t.task.title.as_str()),
      Some("half typed")
    );
  }

  #[tokio::test]
  async fn without_a_manager_only_the_assignee_may_edit() {
    let api = MemoryTaskApi::new(user(1, "Ann", "Lee"))
      .with_user(user(2, "Bob", "Stone"))
      .with_task(task(1, "2024-01-01", 2, 1, TaskStatus::Pending))
      .with_task(task(2, "2024-02-01", 2, 2, TaskStatus::Pending));
    let mut view = TaskListView::new(api);
    view.mount().await.expect("mount");

    assert_eq!(view.current_user().and_then(Identity::id), Some(1));
    assert_eq!(view.current_manager(), None);
    let task = |id| view.task(id).cloned().expect("loaded");
    assert!(view.can_edit(&task(1)));
    assert!(!view.can_edit(&task(2)));
  }

  #[tokio::test]
  async fn name_only_identity_matches_by_display_name() {
    let api = MemoryTaskApi::new(user(1, "Ann", "Lee"))
      .with_user(user(2, "Bob", "Stone"))
      .with_manager(1, user(3, "Cara", "Moss"))
      .with_task(task(1, "2024-01-01", 2, 1, TaskStatus::Pending))
      .with_task(task(2, "2024-02-01", 3, 2, TaskStatus::Pending))
      .with_task(task(3, "2024-03-01", 2, 2, TaskStatus::Pending))
      .with_name_only_identity();
    let mut view = TaskListView::new(api);
    view.mount().await.expect("mount");

    assert_eq!(view.current_user().and_then(Identity::id), None);
    assert_eq!(
      view.current_manager().map(Identity::display_name).as_deref(),
      Some("Cara Moss")
    );
    let task = |id| view.task(id).cloned().expect("loaded");
    // assigned to Ann, resolved through the user list
    assert!(view.can_edit(&task(1)));
    // created by Cara, Ann's manager
    assert!(view.can_edit(&task(2)));
    assert!(!view.can_edit(&task(3)));
  }
}
