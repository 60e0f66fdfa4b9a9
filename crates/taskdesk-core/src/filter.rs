use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use taskdesk_shared::{
  TaskEnvelope,
  TaskStatus,
  UserId
};
use tracing::{
  debug,
  instrument
};

use crate::datetime::parse_timestamp;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum SortOption {
  #[default]
  NewestCreate,
  OldestCreate,
  UpcomingDeadline,
  LatestDeadline
}

impl SortOption {
  pub const ALL: [SortOption; 4] = [
    SortOption::NewestCreate,
    SortOption::OldestCreate,
    SortOption::UpcomingDeadline,
    SortOption::LatestDeadline
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | SortOption::NewestCreate => {
        "newestCreate"
      }
      | SortOption::OldestCreate => {
        "oldestCreate"
      }
      | SortOption::UpcomingDeadline => {
        "upcomingDeadline"
      }
      | SortOption::LatestDeadline => {
        "latestDeadline"
      }
    }
  }
}

impl fmt::Display for SortOption {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortOption {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    SortOption::ALL
      .into_iter()
      .find(|option| {
        option
          .as_str()
          .eq_ignore_ascii_case(s.trim())
      })
      .ok_or_else(|| {
        anyhow!(
          "unknown sort option: {s} \
           (expected newestCreate, \
           oldestCreate, \
           upcomingDeadline or \
           latestDeadline)"
        )
      })
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum StatusOption {
  #[default]
  All,
  Only(TaskStatus)
}

impl StatusOption {
  pub fn admits(
    self,
    status: TaskStatus
  ) -> bool {
    match self {
      | StatusOption::All => true,
      | StatusOption::Only(wanted) => {
        wanted == status
      }
    }
  }
}

impl fmt::Display for StatusOption {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | StatusOption::All => {
        f.write_str("all")
      }
      | StatusOption::Only(status) => {
        write!(f, "{status}")
      }
    }
  }
}

impl FromStr for StatusOption {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case("all")
    {
      return Ok(StatusOption::All);
    }
    s.parse::<TaskStatus>()
      .map(StatusOption::Only)
      .map_err(|e| anyhow!(e))
  }
}

/// Filter, sort and status selections of
/// the task list.
#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub struct FilterState {
  pub created_by_self:     bool,
  pub assigned_to_self:    bool,
  pub created_by_user:     Option<UserId>,
  pub assigned_to_user:    Option<UserId>,
  pub created_by_managed:  Option<UserId>,
  pub assigned_to_managed: Option<UserId>,
  pub sort_option:         SortOption,
  pub status_option:       StatusOption
}

impl FilterState {
  /// Clears the self and user filters.
  /// Managed filters, sort and status
  /// keep their values.
  pub fn reset_identity(&mut self) {
    self.created_by_self = false;
    self.assigned_to_self = false;
    self.created_by_user = None;
    self.assigned_to_user = None;
  }

  /// Query parameters for the filter
  /// endpoint. Only the self and user
  /// filters are sent.
  pub fn query_pairs(
    &self
  ) -> Vec<(&'static str, String)> {
    vec![
      (
        "created_by_self",
        self.created_by_self.to_string()
      ),
      (
        "assigned_to_self",
        self.assigned_to_self.to_string()
      ),
      (
        "created_by_user",
        user_param(self.created_by_user)
      ),
      (
        "assigned_to_user",
        user_param(self.assigned_to_user)
      ),
    ]
  }
}

fn user_param(
  user: Option<UserId>
) -> String {
  user
    .map(|id| id.to_string())
    .unwrap_or_default()
}

/// Orders `tasks` by the selected sort
/// key, then drops every task whose
/// status the status option rejects.
/// Dropped tasks are gone until the next
/// load.
#[instrument(skip(tasks), fields(count = tasks.len()))]
pub fn sort_tasks(
  tasks: &mut Vec<TaskEnvelope>,
  filters: &FilterState
) {
  match filters.sort_option {
    | SortOption::NewestCreate => {
      tasks.sort_by(|a, b| {
        compare_dated(
          created_key(a),
          created_key(b),
          true
        )
      });
    }
    | SortOption::OldestCreate => {
      tasks.sort_by(|a, b| {
        compare_dated(
          created_key(a),
          created_key(b),
          false
        )
      });
    }
    | SortOption::UpcomingDeadline => {
      tasks.sort_by(|a, b| {
        compare_dated(
          deadline_key(a),
          deadline_key(b),
          false
        )
      });
    }
    | SortOption::LatestDeadline => {
      tasks.sort_by(|a, b| {
        compare_dated(
          deadline_key(a),
          deadline_key(b),
          true
        )
      });
    }
  }

  if filters.status_option
    != StatusOption::All
  {
    let before = tasks.len();
    tasks.retain(|envelope| {
      filters
        .status_option
        .admits(envelope.task.status)
    });
    debug!(
      status = %filters.status_option,
      removed = before - tasks.len(),
      "applied status filter"
    );
  }
}

fn created_key(
  envelope: &TaskEnvelope
) -> Option<NaiveDateTime> {
  envelope
    .task
    .created_on
    .as_deref()
    .and_then(parse_timestamp)
}

fn deadline_key(
  envelope: &TaskEnvelope
) -> Option<NaiveDateTime> {
  envelope
    .task
    .deadline
    .as_deref()
    .and_then(parse_timestamp)
}

// Undated entries go last in both
// directions.
fn compare_dated(
  left: Option<NaiveDateTime>,
  right: Option<NaiveDateTime>,
  descending: bool
) -> Ordering {
  match (left, right) {
    | (Some(l), Some(r)) => {
      if descending {
        r.cmp(&l)
      } else {
        l.cmp(&r)
      }
    }
    | (Some(_), None) => Ordering::Less,
    | (None, Some(_)) => {
      Ordering::Greater
    }
    | (None, None) => Ordering::Equal
  }
}
