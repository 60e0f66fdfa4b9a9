use taskdesk_shared::User;
use tracing::{
  debug,
  error
};

use crate::api::TaskApi;

/// Results of the assignee search box.
///
/// Each search gets a generation number;
/// a response is only applied when it
/// answers the newest search issued.
///
/// `run` waits for its response, so the
/// views never have two searches in
/// flight. `begin` and `finish` are the
/// split form for a caller that sends a
/// search per keystroke without waiting.
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
  issued: u64,
  users:  Vec<User>
}

#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct SearchTicket {
  generation: u64,
  query:      String
}

impl UserSearch {
  pub fn users(&self) -> &[User] {
    &self.users
  }

  /// Starts a search and clears the
  /// previous results.
  pub fn begin(
    &mut self,
    query: &str
  ) -> SearchTicket {
    self.issued += 1;
    self.users.clear();
    SearchTicket {
      generation: self.issued,
      query:      query.to_string()
    }
  }

  /// Applies `users` when `ticket` is
  /// still the newest search. Returns
  /// whether they were applied.
  pub fn finish(
    &mut self,
    ticket: &SearchTicket,
    users: Vec<User>
  ) -> bool {
    if ticket.generation != self.issued {
      debug!(
        stale = ticket.generation,
        latest = self.issued,
        query = %ticket.query,
        "dropping stale user search \
         response"
      );
      return false;
    }
    self.users = users;
    true
  }

  /// Runs one search against `api`.
  pub async fn run<A>(
    &mut self,
    api: &A,
    query: &str
  ) -> anyhow::Result<()>
  where
    A: TaskApi + ?Sized
  {
    let ticket = self.begin(query);
    match api.search_users(query).await {
      | Ok(users) => {
        debug!(
          query,
          count = users.len(),
          "user search returned"
        );
        self.finish(&ticket, users);
        Ok(())
      }
      | Err(err) => {
        error!(query, error = %err, "error fetching users");
        Err(err)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use taskdesk_shared::User;

  use super::UserSearch;

  fn user(id: i64) -> User {
    User {
      id,
      first_name: format!("u{id}"),
      last_name: String::new()
    }
  }

  #[test]
  fn late_response_for_older_query_is_dropped()
  {
    let mut search = UserSearch::default();
    let first = search.begin("a");
    let second = search.begin("an");

    assert!(
      search.finish(&second, vec![user(2)])
    );
    assert!(
      !search.finish(&first, vec![user(1)])
    );
    assert_eq!(search.users(), &[user(2)]);
  }

  #[test]
  fn begin_clears_previous_results() {
    let mut search = UserSearch::default();
    let ticket = search.begin("");
    search.finish(&ticket, vec![user(1)]);
    let _next = search.begin("x");
    assert!(search.users().is_empty());
  }
}
