use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use async_trait::async_trait;
use reqwest::header::{
  COOKIE,
  HeaderMap,
  HeaderValue
};
use reqwest::{
  Client,
  RequestBuilder,
  Url
};
use serde::de::DeserializeOwned;
use taskdesk_shared::{
  AddCommentRequest,
  ApiAck,
  Comment,
  CommentsResponse,
  CreateTaskRequest,
  CurrentUser,
  TaskEnvelope,
  TaskId,
  TasksResponse,
  User,
  UsersResponse
};
use tracing::{
  debug,
  instrument,
  warn
};

use super::TaskApi;
use crate::config::{
  Config,
  DEFAULT_BASE_URL,
  DEFAULT_TIMEOUT_SECS
};
use crate::filter::FilterState;

const API_PREFIX: &str = "task/api/";

#[derive(Debug, Clone)]
pub struct ApiSettings {
  pub base_url: Url,
  pub timeout:  Duration,
  /// Raw `Cookie` header carrying the
  /// session of an already signed-in
  /// user.
  pub cookie:   Option<String>
}

impl ApiSettings {
  pub fn new(
    base_url: &str
  ) -> anyhow::Result<Self> {
    Ok(Self {
      base_url: parse_base_url(base_url)?,
      timeout:  Duration::from_secs(
        DEFAULT_TIMEOUT_SECS
      ),
      cookie:   None
    })
  }

  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let base = cfg
      .get("api.base_url")
      .unwrap_or_else(|| {
        DEFAULT_BASE_URL.to_string()
      });
    let timeout = cfg
      .get_u64("api.timeout")?
      .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let cookie = cfg
      .get("api.cookie")
      .filter(|value| !value.is_empty());

    Ok(Self {
      base_url: parse_base_url(&base)?,
      timeout: Duration::from_secs(timeout),
      cookie
    })
  }
}

// Joined paths are relative, so the base
// must end in a slash to keep any prefix.
fn parse_base_url(
  raw: &str
) -> anyhow::Result<Url> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    bail!("api base URL is empty");
  }
  let normalized =
    if trimmed.ends_with('/') {
      trimmed.to_string()
    } else {
      format!("{trimmed}/")
    };
  Url::parse(&normalized).with_context(
    || {
      format!(
        "invalid api base URL: {raw}"
      )
    }
  )
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
  client: Client,
  base:   Url
}

impl HttpTaskApi {
  pub fn new(
    settings: &ApiSettings
  ) -> anyhow::Result<Self> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) =
      settings.cookie.as_deref()
    {
      let value = HeaderValue::from_str(
        cookie
      )
      .context(
        "api.cookie is not a valid \
         header value"
      )?;
      headers.insert(COOKIE, value);
    }

    let client = Client::builder()
      .timeout(settings.timeout)
      .default_headers(headers)
      .build()
      .context(
        "failed building HTTP client \
         for task api"
      )?;

    Ok(Self {
      client,
      base: settings.base_url.clone()
    })
  }

  pub fn endpoint(
    &self,
    path: &str
  ) -> anyhow::Result<Url> {
    self
      .base
      .join(API_PREFIX)
      .and_then(|api| api.join(path))
      .with_context(|| {
        format!(
          "failed building url for \
           {path}"
        )
      })
  }

  pub fn get_tasks_request(
    &self
  ) -> anyhow::Result<RequestBuilder> {
    Ok(
      self
        .client
        .get(self.endpoint("get_tasks")?)
    )
  }

  pub fn filter_tasks_request(
    &self,
    filters: &FilterState
  ) -> anyhow::Result<RequestBuilder> {
    let mut url =
      self.endpoint("filter_task")?;
    {
      let mut pairs =
        url.query_pairs_mut();
      for (key, value) in
        filters.query_pairs()
      {
        pairs.append_pair(key, &value);
      }
    }
    Ok(self.client.get(url))
  }

  pub fn current_user_request(
    &self
  ) -> anyhow::Result<RequestBuilder> {
    Ok(self.client.get(
      self.endpoint("get_current_user")?
    ))
  }

  pub fn search_users_request(
    &self,
    query: &str
  ) -> anyhow::Result<RequestBuilder> {
    let mut url =
      self.endpoint("search_users")?;
    url
      .query_pairs_mut()
      .append_pair("query", query);
    Ok(self.client.get(url))
  }

  pub fn save_task_request(
    &self,
    envelope: &TaskEnvelope
  ) -> anyhow::Result<RequestBuilder> {
    let url = self.endpoint(&format!(
      "save_task/{}",
      envelope.id()
    ))?;
    Ok(self.client.put(url).json(envelope))
  }

  pub fn create_task_request(
    &self,
    request: &CreateTaskRequest
  ) -> anyhow::Result<RequestBuilder> {
    Ok(
      self
        .client
        .post(
          self.endpoint("create_task")?
        )
        .json(request)
    )
  }

  pub fn add_comment_request(
    &self,
    request: &AddCommentRequest
  ) -> anyhow::Result<RequestBuilder> {
    Ok(
      self
        .client
        .post(
          self.endpoint("add_comment")?
        )
        .json(request)
    )
  }

  pub fn get_comments_request(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<RequestBuilder> {
    Ok(self.client.get(self.endpoint(
      &format!("get_comments/{task_id}")
    )?))
  }

  pub fn delete_task_request(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<RequestBuilder> {
    Ok(self.client.delete(self.endpoint(
      &format!("delete/{task_id}")
    )?))
  }
}

async fn fetch_json<T>(
  request: RequestBuilder,
  what: &str
) -> anyhow::Result<T>
where
  T: DeserializeOwned
{
  let body = send(request, what).await?;
  serde_json::from_str(&body)
    .with_context(|| {
      format!(
        "failed decoding {what} response"
      )
    })
}

async fn send_ack(
  request: RequestBuilder,
  what: &str
) -> anyhow::Result<ApiAck> {
  let body = send(request, what).await?;
  if body.trim().is_empty() {
    return Ok(ApiAck::default());
  }

  let ack = match serde_json::from_str::<
    ApiAck,
  >(&body)
  {
    | Ok(ack) => ack,
    | Err(error) => {
      warn!(
        what,
        error = %error,
        "unrecognized acknowledgement \
         body; treating as success"
      );
      return Ok(ApiAck::default());
    }
  };

  ack.into_result().map_err(|error| {
    anyhow!("{what} rejected: {error}")
  })
}

async fn send(
  request: RequestBuilder,
  what: &str
) -> anyhow::Result<String> {
  let response =
    request.send().await.with_context(
      || format!("failed requesting {what}")
    )?;

  let status = response.status();
  let url = response.url().clone();
  let body =
    response.text().await.with_context(
      || {
        format!(
          "failed reading {what} \
           response body"
        )
      }
    )?;
  debug!(what, %url, %status, bytes = body.len(), "api response");

  if !status.is_success() {
    bail!(
      "{what} returned HTTP {status}: \
       {}",
      body.trim()
    );
  }
  Ok(body)
}

#[async_trait]
impl TaskApi for HttpTaskApi {
  #[instrument(skip(self))]
  async fn get_tasks(
    &self
  ) -> anyhow::Result<Vec<TaskEnvelope>> {
    let response: TasksResponse =
      fetch_json(
        self.get_tasks_request()?,
        "get_tasks"
      )
      .await?;
    Ok(response.tasks)
  }

  #[instrument(skip(self))]
  async fn filter_tasks(
    &self,
    filters: &FilterState
  ) -> anyhow::Result<Vec<TaskEnvelope>> {
    let response: TasksResponse =
      fetch_json(
        self.filter_tasks_request(filters)?,
        "filter_task"
      )
      .await?;
    Ok(response.tasks)
  }

  #[instrument(skip(self))]
  async fn current_user(
    &self
  ) -> anyhow::Result<CurrentUser> {
    fetch_json(
      self.current_user_request()?,
      "get_current_user"
    )
    .await
  }

  #[instrument(skip(self))]
  async fn search_users(
    &self,
    query: &str
  ) -> anyhow::Result<Vec<User>> {
    let response: UsersResponse =
      fetch_json(
        self.search_users_request(query)?,
        "search_users"
      )
      .await?;
    Ok(response.users)
  }

  #[instrument(skip(self, envelope), fields(task_id = envelope.id()))]
  async fn save_task(
    &self,
    envelope: &TaskEnvelope
  ) -> anyhow::Result<ApiAck> {
    send_ack(
      self.save_task_request(envelope)?,
      "save_task"
    )
    .await
  }

  #[instrument(skip(self, request), fields(title_len = request.title.len()))]
  async fn create_task(
    &self,
    request: &CreateTaskRequest
  ) -> anyhow::Result<ApiAck> {
    send_ack(
      self.create_task_request(request)?,
      "create_task"
    )
    .await
  }

  #[instrument(skip(self, request), fields(task_id = request.task_id))]
  async fn add_comment(
    &self,
    request: &AddCommentRequest
  ) -> anyhow::Result<ApiAck> {
    send_ack(
      self.add_comment_request(request)?,
      "add_comment"
    )
    .await
  }

  #[instrument(skip(self))]
  async fn get_comments(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<Vec<Comment>> {
    let response: CommentsResponse =
      fetch_json(
        self.get_comments_request(task_id)?,
        "get_comments"
      )
      .await?;
    Ok(response.comments)
  }

  #[instrument(skip(self))]
  async fn delete_task(
    &self,
    task_id: TaskId
  ) -> anyhow::Result<ApiAck> {
    send_ack(
      self.delete_task_request(task_id)?,
      "delete_task"
    )
    .await
  }
}
