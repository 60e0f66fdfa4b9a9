use taskdesk_shared::{
  ApiAck,
  CreateTaskRequest,
  TaskStatus,
  User,
  UserId
};
use tracing::{
  debug,
  error,
  info,
  instrument
};

use crate::api::TaskApi;
use crate::datetime::format_deadline;
use crate::platform::{
  Clipboard,
  Navigator
};
use crate::search::UserSearch;

/// State behind the new-task form.
pub struct TaskCreateView<A, C, N> {
  api:           A,
  clipboard:     C,
  navigator:     N,
  pub title:       String,
  pub description: String,
  /// `datetime-local` value, e.g.
  /// `2024-05-01T13:30`.
  pub deadline:    String,
  pub status:      TaskStatus,
  search_query:  String,
  assigned_user: Option<UserId>,
  users:         UserSearch
}

impl<A, C, N> TaskCreateView<A, C, N>
where
  A: TaskApi,
  C: Clipboard,
  N: Navigator
{
  pub fn new(
    api: A,
    clipboard: C,
    navigator: N
  ) -> Self {
    Self {
      api,
      clipboard,
      navigator,
      title: String::new(),
      description: String::new(),
      deadline: String::new(),
      status: TaskStatus::Pending,
      search_query: String::new(),
      assigned_user: None,
      users: UserSearch::default()
    }
  }

  pub fn api(&self) -> &A {
    &self.api
  }

  pub fn clipboard(&self) -> &C {
    &self.clipboard
  }

  pub fn navigator(&self) -> &N {
    &self.navigator
  }

  pub fn users(&self) -> &[User] {
    self.users.users()
  }

  pub fn search_query(&self) -> &str {
    &self.search_query
  }

  pub fn assigned_user(
    &self
  ) -> Option<UserId> {
    self.assigned_user
  }

  #[instrument(skip(self))]
  pub async fn mount(
    &mut self
  ) -> anyhow::Result<()> {
    info!("task form mounted");
    self.get_users("").await
  }

  /// Submits the form. Title,
  /// description and deadline are
  /// cleared whether or not the server
  /// accepts the task.
  #[instrument(skip(self), fields(title_len = self.title.len()))]
  pub async fn create_task(
    &mut self
  ) -> anyhow::Result<ApiAck> {
    let request = CreateTaskRequest {
      title:       self.title.clone(),
      description: self.description.clone(),
      deadline:    format_deadline(
        &self.deadline
      ),
      status:      self.status,
      assigned_to: self.assigned_user
    };
    debug!(?request, "creating task");
    self.clear();

    match self.api.create_task(&request).await
    {
      | Ok(ack) => {
        info!(task_id = ?ack.task_id, message = ?ack.message, "task created");
        Ok(ack)
      }
      | Err(err) => {
        error!(error = %err, "error creating task");
        Err(err)
      }
    }
  }

  pub fn clear(&mut self) {
    self.title.clear();
    self.description.clear();
    self.deadline.clear();
  }

  pub async fn get_users(
    &mut self,
    query: &str
  ) -> anyhow::Result<()> {
    self.users.run(&self.api, query).await
  }

  /// Updates the search box. A changed
  /// value searches again right away.
  pub async fn set_search_query(
    &mut self,
    query: &str
  ) -> anyhow::Result<()> {
    if self.search_query == query {
      return Ok(());
    }
    debug!(query, "search query changed");
    self.search_query = query.to_string();
    self.get_users(query).await
  }

  /// Picks `user` as assignee and shows
  /// their name in the search box, which
  /// searches again like any other edit
  /// of the box. The pick stands even if
  /// that search fails.
  pub async fn select_user(
    &mut self,
    user: &User
  ) -> anyhow::Result<()> {
    self.assigned_user = Some(user.id);
    debug!(user = user.id, "assignee selected");
    self
      .set_search_query(&user.display_name())
      .await
  }

  pub fn copy(&mut self) -> anyhow::Result<()> {
    let text = format!(
      "Title: {}\nDescription: {}",
      self.title, self.description
    );
    match self.clipboard.write_text(&text) {
      | Ok(()) => {
        info!("text copied to clipboard");
        Ok(())
      }
      | Err(err) => {
        error!(error = %err, "failed to copy text");
        Err(err)
      }
    }
  }

  pub fn cancel(&mut self) {
    self.navigator.back();
  }
}

#[cfg(test)]
mod tests {
  use anyhow::bail;
  use taskdesk_shared::{
    TaskStatus,
    User
  };

  use super::TaskCreateView;
  use crate::api::{
    ApiCall,
    Endpoint,
    MemoryTaskApi
  };
  use crate::platform::{
    Clipboard,
    HistoryNavigator,
    MemoryClipboard
  };

  type View = TaskCreateView<
    MemoryTaskApi,
    MemoryClipboard,
    HistoryNavigator
  >;

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

  fn view() -> View {
    let api = MemoryTaskApi::new(user(1, "Ann", "Lee"))
      .with_user(user(7, "Ann ", "Lee "))
      .with_user(user(8, "Bob", "Annan"));
    TaskCreateView::new(
      api,
      MemoryClipboard::default(),
      HistoryNavigator::new(["/task/dashboard", "/task/create"])
    )
  }

  fn last_create(view: &View) -> ApiCall {
    view
      .api()
      .calls()
      .into_iter()
      .rev()
      .find(|c| matches!(c, ApiCall::CreateTask(_)))
      .expect("create_task was called")
  }

  #[tokio::test]
  async fn deadline_is_reformatted_and_form_cleared() {
    let mut view = view();
    view.title = "Ship".to_string();
    view.description = "cut the tag".to_string();
    view.deadline = "2024-05-01T13:30".to_string();

    let ack = view.create_task().await.expect("create");
    assert_eq!(ack.task_id, Some(1));

    let ApiCall::CreateTask(request) = last_create(&view) else {
      unreachable!()
    };
    assert_eq!(request.deadline, "2024-05-01 13:30");
    assert_eq!(request.status, TaskStatus::Pending);
    assert!(view.title.is_empty());
    assert!(view.description.is_empty());
    assert!(view.deadline.is_empty());
  }

  #[tokio::test]
  async fn empty_deadline_is_sent_empty_and_failure_still_clears() {
    let mut view = view();
    view.title = "Ship".to_string();
    view.api().fail_next(Endpoint::CreateTask);

    assert!(view.create_task().await.is_err());
    let ApiCall::CreateTask(request) = last_create(&view) else {
      unreachable!()
    };
    assert_eq!(request.deadline, "");
    assert!(view.title.is_empty());
    assert!(view.api().tasks().is_empty());
  }

  #[tokio::test]
  async fn selecting_user_sets_assignee_and_trimmed_name() {
    let mut view = view();
    view.mount().await.expect("mount");
    let ann = view
      .users()
      .iter()
      .find(|u| u.id == 7)
      .cloned()
      .expect("user 7 listed");

    view.select_user(&ann).await.expect("select");
    assert_eq!(view.assigned_user(), Some(7));
    assert_eq!(view.search_query(), "Ann Lee");
    assert_eq!(
      view.api().calls().last(),
      Some(&ApiCall::SearchUsers(
        "Ann Lee".to_string()
      ))
    );

    view.title = "Review".to_string();
    view.create_task().await.expect("create");
    let ApiCall::CreateTask(request) = last_create(&view) else {
      unreachable!()
    };
    assert_eq!(request.assigned_to, Some(7));
  }

  #[tokio::test]
  async fn every_query_change_searches_again() {
    let mut view = view();
    view.set_search_query("a").await.expect("search");
    view.set_search_query("an").await.expect("search");
    view.set_search_query("an").await.expect("unchanged");
    view.set_search_query("bob").await.expect("search");

    let searches: Vec<String> = view
      .api()
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        | ApiCall::SearchUsers(q) => Some(q),
        | _ => None
      })
      .collect();
    assert_eq!(searches, vec!["a", "an", "bob"]);
    assert_eq!(
      view.users().iter().map(|u| u.id).collect::<Vec<_>>(),
      vec![8]
    );
  }

  #[tokio::test]
  async fn selection_survives_failed_search() {
    let mut view = view();
    view.api().fail_next(Endpoint::SearchUsers);
    assert!(
      view
        .select_user(&user(8, "Bob", "Annan"))
        .await
        .is_err()
    );
    assert_eq!(view.assigned_user(), Some(8));
    assert_eq!(view.search_query(), "Bob Annan");
  }

  #[test]
  fn copy_writes_title_and_description() {
    let mut view = view();
    view.title = "Ship".to_string();
    view.description = "cut the tag".to_string();
    view.copy().expect("copy");
    assert_eq!(
      view.clipboard().contents.as_deref(),
      Some("Title: Ship\nDescription: cut the tag")
    );
  }

  struct BrokenClipboard;

  impl Clipboard for BrokenClipboard {
    fn write_text(
      &mut self,
      _text: &str
    ) -> anyhow::Result<()> {
      bail!("clipboard unavailable")
    }
  }

  #[test]
  fn copy_failure_is_reported() {
    let mut view = TaskCreateView::new(
      MemoryTaskApi::new(user(1, "Ann", "Lee")),
      BrokenClipboard,
      HistoryNavigator::default()
    );
    assert!(view.copy().is_err());
  }

  #[test]
  fn cancel_goes_back_one_page() {
    let mut view = view();
    view.cancel();
    assert_eq!(
      view.navigator().current(),
      Some("/task/dashboard")
    );
  }
}
