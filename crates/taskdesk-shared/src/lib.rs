use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;

pub type TaskId = i64;
pub type UserId = i64;

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  #[default]
  Pending,
  Acknowledged,
  Rejected,
  Completed,
  Failed
}

impl TaskStatus {
  pub const ALL: [TaskStatus; 5] = [
    TaskStatus::Pending,
    TaskStatus::Acknowledged,
    TaskStatus::Rejected,
    TaskStatus::Completed,
    TaskStatus::Failed
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | TaskStatus::Pending => "pending",
      | TaskStatus::Acknowledged => {
        "acknowledged"
      }
      | TaskStatus::Rejected => "rejected",
      | TaskStatus::Completed => {
        "completed"
      }
      | TaskStatus::Failed => "failed"
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TaskStatus {
  type Err = String;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let wanted =
      s.trim().to_ascii_lowercase();
    TaskStatus::ALL
      .into_iter()
      .find(|status| {
        status.as_str() == wanted
      })
      .ok_or_else(|| {
        format!(
          "unknown task status: {s}"
        )
      })
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Task {
  pub id:          TaskId,
  #[serde(default)]
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub deadline:    Option<String>,
  #[serde(default)]
  pub status:      TaskStatus,
  #[serde(default)]
  pub assigned_to: Option<UserId>,
  #[serde(default)]
  pub created_on:  Option<String>,
  #[serde(default)]
  pub created_by:  Option<UserId>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub modified_on: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub modified_by: Option<UserId>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

/// Display identity of the user who created a task.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct AuthorName {
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name:  String
}

impl AuthorName {
  pub fn display(&self) -> String {
    format!(
      "{} {}",
      self.first_name, self.last_name
    )
  }
}

/// A task row as the API returns it:
/// the task joined with its creator's
/// name.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskEnvelope {
  pub task:      Task,
  #[serde(default)]
  pub auth_user: AuthorName
}

impl TaskEnvelope {
  pub fn id(&self) -> TaskId {
    self.task.id
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct User {
  pub id:         UserId,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name:  String
}

impl User {
  /// First and last name, each trimmed,
  /// joined by one space.
  pub fn display_name(&self) -> String {
    format!(
      "{} {}",
      self.first_name.trim(),
      self.last_name.trim()
    )
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Comment {
  #[serde(default)]
  pub id:         Option<i64>,
  pub task_id:    TaskId,
  #[serde(default)]
  pub body:       String,
  #[serde(default)]
  pub created_by: Option<UserId>,
  #[serde(default)]
  pub created_on: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct CurrentUser {
  pub user:    Identity,
  #[serde(default)]
  pub manager: Option<Identity>
}

/// A person as `get_current_user`
/// reports them: a full user record, or
/// only a "First Last" display name.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(untagged)]
pub enum Identity {
  User(User),
  Name(String)
}

impl Identity {
  pub fn id(&self) -> Option<UserId> {
    match self {
      | Identity::User(user) => Some(user.id),
      | Identity::Name(_) => None
    }
  }

  pub fn display_name(&self) -> String {
    match self {
      | Identity::User(user) => {
        user.display_name()
      }
      | Identity::Name(name) => {
        name.trim().to_string()
      }
    }
  }

  /// Whether this is the person with
  /// `id` and `name`. Ids decide when
  /// both sides carry one; otherwise the
  /// trimmed display names are compared.
  pub fn is(
    &self,
    id: Option<UserId>,
    name: Option<&str>
  ) -> bool {
    match (self.id(), id) {
      | (Some(mine), Some(theirs)) => {
        mine == theirs
      }
      | _ => name.is_some_and(|name| {
        !name.trim().is_empty()
          && name.trim() == self.display_name()
      })
    }
  }
}

impl From<User> for Identity {
  fn from(user: User) -> Self {
    Identity::User(user)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct TasksResponse {
  #[serde(default)]
  pub tasks: Vec<TaskEnvelope>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct UsersResponse {
  #[serde(default)]
  pub users: Vec<User>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct CommentsResponse {
  #[serde(default)]
  pub comments: Vec<Comment>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct CreateTaskRequest {
  pub title:       String,
  pub description: String,
  pub deadline:    String,
  pub status:      TaskStatus,
  pub assigned_to: Option<UserId>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct AddCommentRequest {
  pub task_id: TaskId,
  pub body:    String
}

/// Body of a mutating call. The server
/// reports validation failures with a
/// success status and an `error` field.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
pub struct ApiAck {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub error:   Option<String>,
  #[serde(default)]
  pub errors:  Option<Value>,
  #[serde(default)]
  pub task_id: Option<TaskId>
}

impl ApiAck {
  pub fn ok(
    message: impl Into<String>
  ) -> Self {
    Self {
      message: Some(message.into()),
      ..Self::default()
    }
  }

  pub fn into_result(
    self
  ) -> Result<Self, String> {
    match self.error.as_deref() {
      | Some(error) => {
        match self.errors.as_ref() {
          | Some(details) => Err(format!(
            "{error}: {details}"
          )),
          | None => Err(error.to_string())
        }
      }
      | None => Ok(self)
    }
  }
}
