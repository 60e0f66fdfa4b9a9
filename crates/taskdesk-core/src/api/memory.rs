use std::collections::{
  BTreeMap,
  HashSet
};

use anyhow::{
  anyhow,
  bail
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use taskdesk_shared::{
  AddCommentRequest,
  ApiAck,
  AuthorName,
  Comment,
  CreateTaskRequest,
  CurrentUser,
  Identity,
  Task,
  TaskEnvelope,
  TaskId,
  User,
  UserId
};
use tracing::debug;

use super::TaskApi;
use crate::filter::FilterState;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum Endpoint {
  GetTasks,
  FilterTasks,
  CurrentUser,
  SearchUsers,
  SaveTask,
  CreateTask,
  AddComment,
  GetComments,
  DeleteTask
}

/// One request as the in-memory backend
/// received it.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
  GetTasks,
  FilterTasks(Vec<(&'static str, String)>),
  CurrentUser,
  SearchUsers(String),
  SaveTask(TaskEnvelope),
  CreateTask(CreateTaskRequest),
  AddComment(AddCommentRequest),
  GetComments(TaskId),
  DeleteTask(TaskId)
}

impl ApiCall {
  pub fn endpoint(&self) -> Endpoint {
    match self {
      | ApiCall::GetTasks => {
        Endpoint::GetTasks
      }
      | ApiCall::FilterTasks(_) => {
        Endpoint::FilterTasks
      }
      | ApiCall::CurrentUser => {
        Endpoint::CurrentUser
      }
      | ApiCall::SearchUsers(_) => {
        Endpoint::SearchUsers
      }
      | ApiCall::SaveTask(_) => {
        Endpoint::SaveTask
      }
      | ApiCall::CreateTask(_) => {
        Endpoint::CreateTask
      }
      | ApiCall::AddComment(_) => {
        Endpoint::AddComment
      }
      | ApiCall::GetComments(_) => {
        Endpoint::GetComments
      }
      | ApiCall::DeleteTask(_) => {
        Endpoint::DeleteTask
      }
    }
  }
}

#[derive(Debug)]
struct MemoryState {
  actor:           User,
  users:           Vec<User>,
  managers:        BTreeMap<UserId, UserId>,
  tasks:           Vec<TaskEnvelope>,
  comments:        Vec<Comment>,
  next_task_id:    TaskId,
  next_comment_id: i64,
  calls:           Vec<ApiCall>,
  failing:         HashSet<Endpoint>,
  /// Answer `get_current_user` with
  /// display names instead of records.
  names_only:      bool
}

/// Task backend held in process. Acts as
/// the signed-in `actor` and answers the
/// way the server does.
#[derive(Debug)]
pub struct MemoryTaskApi {
  state: Mutex<MemoryState>
}

impl MemoryTaskApi {
  pub fn new(actor: User) -> Self {
    Self {
      state: Mutex::new(MemoryState {
        users: vec![actor.clone()],
        actor,
        managers: BTreeMap::new(),
        tasks: vec![],
        comments: vec![],
        next_task_id: 1,
        next_comment_id: 1,
        calls: vec![],
        failing: HashSet::new(),
        names_only: false
      })
    }
  }

  pub fn with_user(
    mut self,
    user: User
  ) -> Self {
    let state = self.state.get_mut();
    state.users.retain(|u| u.id != user.id);
    state.users.push(user);
    self
  }

  /// Records `manager` as the manager of
  /// `user_id`.
  pub fn with_manager(
    mut self,
    user_id: UserId,
    manager: User
  ) -> Self {
    let manager_id = manager.id;
    self = self.with_user(manager);
    self
      .state
      .get_mut()
      .managers
      .insert(user_id, manager_id);
    self
  }

  pub fn with_task(
    mut self,
    task: Task
  ) -> Self {
    let state = self.state.get_mut();
    state.next_task_id =
      state.next_task_id.max(task.id + 1);
    let auth_user =
      author_of(&state.users, task.created_by);
    state.tasks.push(TaskEnvelope {
      task,
      auth_user
    });
    self
  }

  pub fn with_comment(
    mut self,
    task_id: TaskId,
    body: &str
  ) -> Self {
    let state = self.state.get_mut();
    let id = state.next_comment_id;
    state.next_comment_id += 1;
    state.comments.push(Comment {
      id: Some(id),
      task_id,
      body: body.to_string(),
      created_by: Some(state.actor.id),
      created_on: None
    });
    self
  }

  /// Reports the current user and their
  /// manager as "First Last" strings,
  /// the way the web app's controller
  /// does.
  pub fn with_name_only_identity(
    mut self
  ) -> Self {
    self.state.get_mut().names_only = true;
    self
  }

  /// Makes the next call to `endpoint`
  /// fail once.
  pub fn fail_next(
    &self,
    endpoint: Endpoint
  ) {
    self.state.lock().failing.insert(endpoint);
  }

  pub fn calls(&self) -> Vec<ApiCall> {
    self.state.lock().calls.clone()
  }

  pub fn clear_calls(&self) {
    self.state.lock().calls.clear();
  }

  pub fn tasks(&self) -> Vec<TaskEnvelope> {
    self.state.lock().tasks.clone()
  }

  pub fn comments_for(
    &self,
    task_id: TaskId
  ) -> Vec<Comment> {
    self
      .state
      .lock()
      .comments
      .iter()
      .filter(|c| c.task_id == task_id)
      .cloned()
      .collect()
  }

  fn record(
    &self,
    call: ApiCall
  ) -> anyhow::Result<
    parking_lot::MutexGuard<
      '_,
      MemoryState
    >
  > {
    let mut state = self.state.lock();
    let endpoint = call.endpoint();
    debug!(?endpoint, "memory api call");
    state.calls.push(call);
    if state.failing.remove(&endpoint) {
      bail!(
        "injected failure for \
         {endpoint:?}"
      );
    }
    Ok(state)
  }
}

fn author_of(
  users: &[User],
  user_id: Option<UserId>
) -> AuthorName {
  user_id
    .and_then(|id| {
      users.iter().find(|u| u.id == id)
    })
    .map(|u| AuthorName {
      first_name: u.first_name.clone(),
      last_name:  u.last_name.clone()
    })
    .unwrap_or_default()
}

fn now_stamp() -> String {
  Utc::now()
    .format("%Y-%m-%d %H:%M:%S")
    .to_string()
}

#[async_trait]
impl TaskApi for MemoryTaskApi {
  async fn get_tasks(
    &self
  ) -> anyhow::Result<Vec<TaskEnvelope>> {
    let state =
      self.record(ApiCall::GetTasks)?;
    Ok(state.tasks.clone())
  }

  async fn filter_tasks(
    &self,
    filters: &FilterState
  ) -> anyhow::Result<Vec<TaskEnvelope>> {
    let state = self.record(
      ApiCall::FilterTasks(
        filters.query_pairs()
      )
    )?;
    let actor = state.actor.id;
    Ok(
      state
        .tasks
        .iter()
        .filter(|envelope| {
          let task = &envelope.task;
          (!filters.created_by_self
            || task.created_by == Some(actor))
            && (!filters.assigned_to_self
              || task.assigned_to
                == Some(actor))
            && filters
              .created_by_user
              .is_none_or(|id| {
                task.created_by == Some(id)
              })
            && filters
              .assigned_to_user
              .is_none_or(|id| {
                task.assigned_to == Some(id)
              })
        })
        .cloned()
        .collect()
    )
  }

  async fn current_user(
    &self
  ) -> anyhow::Result<CurrentUser> {
    let state =
      self.record(ApiCall::CurrentUser)?;
    let manager = state
      .managers
      .get(&state.actor.id)
      .and_then(|id| {
        state
          .users
          .iter()
          .find(|u| u.id == *id)
      })
      .cloned();
    let identity = |user: User| {
      if state.names_only {
        Identity::Name(user.display_name())
      } else {
        Identity::User(user)
      }
    };
    Ok(CurrentUser {
      user:    identity(state.actor.clone()),
      manager: manager.map(identity)
    })
  }

  async fn search_users(
    &self,
    query: &str
  ) -> anyhow::Result<Vec<User>> {
    let state = self.record(
      ApiCall::SearchUsers(
        query.to_string()
      )
    )?;
    if query.is_empty() {
      return Ok(state.users.clone());
    }
    let needle = query.to_lowercase();
    Ok(
      state
        .users
        .iter()
        .filter(|u| {
          u.first_name
            .to_lowercase()
            .contains(&needle)
            || u
              .last_name
              .to_lowercase()
              .contains(&needle)
        })
        .cloned()
        .collect()
    )
  }

  async fn save_task(
    &self,
    envelope: &TaskEnvelope
  ) -> anyhow::Result<ApiAck> {
    let mut state = self.record(
      ApiCall::SaveTask(envelope.clone())
    )?;
    let modified_by = state.actor.id;
    let stored = state
      .tasks
      .iter_mut()
      .find(|t| t.id() == envelope.id())
      .ok_or_else(|| {
        anyhow!("Task not found")
      })?;
    stored.task = envelope.task.clone();
    stored.task.modified_on =
      Some(now_stamp());
    stored.task.modified_by =
      Some(modified_by);
    Ok(ApiAck::ok("Task updated"))
  }

  async fn create_task(
    &self,
    request: &CreateTaskRequest
  ) -> anyhow::Result<ApiAck> {
    let mut state = self.record(
      ApiCall::CreateTask(request.clone())
    )?;
    if request.title.trim().is_empty() {
      bail!(
        "create_task rejected: \
         Validation error (insert)"
      );
    }

    let id = state.next_task_id;
    state.next_task_id += 1;
    let actor = state.actor.clone();
    let stamp = now_stamp();
    state.tasks.push(TaskEnvelope {
      task:      Task {
        id,
        title: request.title.clone(),
        description: request
          .description
          .clone(),
        deadline: Some(
          request.deadline.clone()
        )
        .filter(|d| !d.is_empty()),
        status: request.status,
        assigned_to: request.assigned_to,
        created_on: Some(stamp),
        created_by: Some(actor.id),
        modified_on: None,
        modified_by: None,
        extra: BTreeMap::new()
      },
      auth_user: AuthorName {
        first_name: actor.first_name,
        last_name:  actor.last_name
      }
    });

    Ok(ApiAck {
      task_id: Some(id),
      ..ApiAck::ok("Task created")
    })
  }

  async fn add_comment(
    &self,
    request: &AddCommentRequest
  ) -> anyhow::Result<ApiAck> {
    let mut state = self.record(
      ApiCall::AddComment(request.clone())
    )?;
    if request.body.trim().is_empty() {
      bail!(
        "add_comment rejected: \
         Validation error (add_comment)"
      );
    }
    if !state
      .tasks
      .iter()
      .any(|t| t.id() == request.task_id)
    {
      bail!(
        "add_comment rejected: task {} \
         does not exist",
        request.task_id
      );
    }

    let id = state.next_comment_id;
    state.next_comment_id += 1;
    let author = state.actor.id;
    state.comments.push(Comment {
      id: Some(id),
      task_id: request.task_id,
      body: request.body.clone(),
      created_by: Some(author),
      created_on: Some(now_stamp())
    });
    Ok(ApiAck::ok("Comment created"))
  }

  async fn get_comments(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<Vec<Comment>> {
    let state = self
      .record(ApiCall::GetComments(task_id))?;
    Ok(
      state
        .comments
        .iter()
        .filter(|c| c.task_id == task_id)
        .cloned()
        .collect()
    )
  }

  async fn delete_task(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<ApiAck> {
    let mut state = self
      .record(ApiCall::DeleteTask(task_id))?;
    let actor = state.actor.id;
    let Some(creator) = state
      .tasks
      .iter()
      .find(|t| t.id() == task_id)
      .map(|t| t.task.created_by)
    else {
      bail!(
        "delete_task rejected: Failed to \
         delete task, not found in \
         database."
      );
    };

    let manages_creator = creator
      .and_then(|id| state.managers.get(&id))
      == Some(&actor);
    if creator != Some(actor)
      && !manages_creator
    {
      bail!(
        "delete_task rejected: Task \
         found but not deleted."
      );
    }

    state.tasks.retain(|t| t.id() != task_id);
    state
      .comments
      .retain(|c| c.task_id != task_id);
    Ok(ApiAck::ok(format!(
      "deleted{task_id}"
    )))
  }
}
