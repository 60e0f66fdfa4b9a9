//! Backend port of the task views.
//!
//! `TaskApi` mirrors the HTTP surface one
//! method per endpoint. `HttpTaskApi`
//! talks to a live server and
//! `MemoryTaskApi` keeps everything in
//! process.

mod http;
mod memory;

use async_trait::async_trait;
pub use http::{
  ApiSettings,
  HttpTaskApi
};
pub use memory::{
  ApiCall,
  Endpoint,
  MemoryTaskApi
};
use taskdesk_shared::{
  AddCommentRequest,
  ApiAck,
  Comment,
  CreateTaskRequest,
  CurrentUser,
  TaskEnvelope,
  TaskId,
  User
};

use crate::filter::FilterState;

#[async_trait]
pub trait TaskApi: Send + Sync {
  /// `GET /task/api/get_tasks`
  async fn get_tasks(
    &self
  ) -> anyhow::Result<Vec<TaskEnvelope>>;

  /// `GET /task/api/filter_task`
  async fn filter_tasks(
    &self,
    filters: &FilterState
  ) -> anyhow::Result<Vec<TaskEnvelope>>;

  /// `GET /task/api/get_current_user`
  async fn current_user(
    &self
  ) -> anyhow::Result<CurrentUser>;

  /// `GET /task/api/search_users`
  async fn search_users(
    &self,
    query: &str
  ) -> anyhow::Result<Vec<User>>;

  /// `PUT /task/api/save_task/{id}`
  async fn save_task(
    &self,
    envelope: &TaskEnvelope
  ) -> anyhow::Result<ApiAck>;

  /// `POST /task/api/create_task`
  async fn create_task(
    &self,
    request: &CreateTaskRequest
  ) -> anyhow::Result<ApiAck>;

  /// `POST /task/api/add_comment`
  async fn add_comment(
    &self,
    request: &AddCommentRequest
  ) -> anyhow::Result<ApiAck>;

  /// `GET /task/api/get_comments/{id}`
  async fn get_comments(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<Vec<Comment>>;

  /// `DELETE /task/api/delete/{id}`
  async fn delete_task(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<ApiAck>;
}

/// Lets a view borrow a backend the
/// caller keeps.
#[async_trait]
impl<'a, T> TaskApi for &'a T
where
  T: TaskApi + ?Sized
{
  async fn get_tasks(
    &self
  ) -> anyhow::Result<Vec<TaskEnvelope>> {
    (**self).get_tasks().await
  }

  async fn filter_tasks(
    &self,
    filters: &FilterState
  ) -> anyhow::Result<Vec<TaskEnvelope>> {
    (**self).filter_tasks(filters).await
  }

  async fn current_user(
    &self
  ) -> anyhow::Result<CurrentUser> {
    (**self).current_user().await
  }

  async fn search_users(
    &self,
    query: &str
  ) -> anyhow::Result<Vec<User>> {
    (**self).search_users(query).await
  }

  async fn save_task(
    &self,
    envelope: &TaskEnvelope
  ) -> anyhow::Result<ApiAck> {
    (**self).save_task(envelope).await
  }

  async fn create_task(
    &self,
    request: &CreateTaskRequest
  ) -> anyhow::Result<ApiAck> {
    (**self).create_task(request).await
  }

  async fn add_comment(
    &self,
    request: &AddCommentRequest
  ) -> anyhow::Result<ApiAck> {
    (**self).add_comment(request).await
  }

  async fn get_comments(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<Vec<Comment>> {
    (**self).get_comments(task_id).await
  }

  async fn delete_task(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<ApiAck> {
    (**self).delete_task(task_id).await
  }
}
