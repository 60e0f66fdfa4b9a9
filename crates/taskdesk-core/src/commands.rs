use anyhow::{Context, anyhow, bail};
use tracing::{info, instrument};

use crate::api::TaskApi;
use crate::cli::{Command, OrderArgs};
use crate::create_view::TaskCreateView;
use crate::datetime::format_deadline;
use crate::filter::FilterState;
use crate::list_view::TaskListView;
use crate::platform::{HistoryNavigator, StdoutClipboard};
use crate::render::Renderer;

/// Runs one CLI command against `api`.
#[instrument(skip(api, renderer, command))]
pub async fn dispatch<A>(api: A, renderer: &mut Renderer, command: Command) -> anyhow::Result<()>
where
    A: TaskApi,
{
    match command {
        Command::List { order } => {
            let mut view = TaskListView::new(api);
            apply_order(&mut view.filters, &order);
            view.load_tasks().await?;
            print_tasks(&view, renderer)
        }
        Command::Filter {
            created_by_self,
            assigned_to_self,
            created_by_user,
            assigned_to_user,
            order,
        } => {
            let mut view = TaskListView::new(api);
            view.filters.created_by_self = created_by_self;
            view.filters.assigned_to_self = assigned_to_self;
            view.filters.created_by_user = created_by_user;
            view.filters.assigned_to_user = assigned_to_user;
            apply_order(&mut view.filters, &order);
            view.filter_task().await?;
            print_tasks(&view, renderer)
        }
        Command::Comments { task_id } => {
            let mut view = TaskListView::new(api);
            view.get_comments(task_id).await?;
            renderer.print_comments(task_id, view.comments_for(task_id))
        }
        Command::Comment { task_id, body } => {
            let mut view = TaskListView::new(api);
            view.new_comment = body;
            view.add_comment(task_id).await?;
            info!(task_id, "comment posted");
            Ok(())
        }
        Command::Users { query } => {
            let mut view = TaskListView::new(api);
            view.get_users(&query).await?;
            renderer.print_users(view.users())
        }
        Command::Create {
            title,
            description,
            deadline,
            status,
            assignee_query,
            copy,
        } => {
            let mut view =
                TaskCreateView::new(api, StdoutClipboard, HistoryNavigator::default());
            if let Some(query) = assignee_query {
                view.set_search_query(&query).await?;
                let user = view
                    .users()
                    .first()
                    .cloned()
                    .ok_or_else(|| anyhow!("no user matches {query:?}"))?;
                view.select_user(&user).await?;
                info!(user = user.id, name = %user.display_name(), "assignee picked");
            }
            view.title = title;
            view.description = description;
            view.deadline = deadline;
            if let Some(status) = status {
                view.status = status;
            }
            if copy {
                view.copy()?;
            }
            let ack = view.create_task().await?;
            renderer.print_ack(&ack)
        }
        Command::Update {
            task_id,
            title,
            description,
            deadline,
            status,
        } => {
            let mut view = TaskListView::new(api);
            view.load_tasks().await?;
            if !view.edit_task(task_id) {
                bail!("task {task_id} is not visible to you");
            }
            let task = view
                .task_mut(task_id)
                .with_context(|| format!("task {task_id} disappeared while editing"))?;
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(description) = description {
                task.description = description;
            }
            if let Some(deadline) = deadline {
                task.deadline = Some(format_deadline(&deadline));
            }
            if let Some(status) = status {
                task.status = status;
            }
            if let Err(err) = view.save_task(task_id).await {
                view.cancel_edit();
                return Err(err);
            }
            println!("task {task_id} saved");
            Ok(())
        }
        Command::Delete { task_id } => {
            let mut view = TaskListView::new(api);
            view.delete_task(task_id).await?;
            println!("task {task_id} deleted");
            Ok(())
        }
        Command::Whoami => {
            let current = api.current_user().await.context("failed to load current user")?;
            renderer.print_current_user(&current)
        }
    }
}

fn apply_order(filters: &mut FilterState, order: &OrderArgs) {
    if let Some(sort) = order.sort {
        filters.sort_option = sort;
    }
    if let Some(status) = order.status {
        filters.status_option = status;
    }
}

fn print_tasks<A>(view: &TaskListView<A>, renderer: &mut Renderer) -> anyhow::Result<()>
where
    A: TaskApi,
{
    renderer.print_task_table(view.tasks(), |id| view.comments_for(id).len())
}
