//! One async handler per command.
//!
//! Handlers that touch the store hold their operation-class guard for the whole call.
//! Mutations go through the store's `_with` variants so the repository is written first.

use anyhow::Result;

use super::context::HandlerContext;
use crate::collection::{OperationClass, StoreError};
use crate::model::StudyGroup;
use crate::protocol::{CommandId, Response};

/// Turns a store failure into the text shown to the caller.
fn store_failure(command: CommandId, owner: &str, err: StoreError) -> Response {
    match err {
        StoreError::NotFound(id) => Response::failed(format!("no group with id {}", id)),
        StoreError::NotOwner { id, .. } => {
            tracing::info!("{} refused: {} does not own group {}", command, owner, id);
            Response::failed(format!("group {} does not belong to you", id))
        }
        StoreError::PassportTaken(passport) => {
            tracing::info!("{} refused: passport id {} is taken", command, passport);
            Response::failed(format!(
                "passport id {} already belongs to another person",
                passport
            ))
        }
        StoreError::IdsExhausted => Response::failed("no identifiers left for new groups"),
        StoreError::DuplicateId(id) => {
            tracing::error!("{} hit duplicate id {}", command, id);
            Response::failed("internal error: duplicate identifier")
        }
        StoreError::Repository(e) => {
            tracing::error!("{} could not be persisted: {}", command, e);
            Response::failed("internal error: the change could not be saved")
        }
    }
}

/// Success text unless the request asked for silence.
fn done(mute: bool, message: impl Into<String>) -> Response {
    let mut response = Response::ok();
    if !mute {
        response.console(message);
    }
    response
}

pub async fn handle_help(_ctx: HandlerContext) -> Result<Response> {
    let mut response = Response::ok();
    for command in CommandId::ALL.iter().filter(|c| c.is_user_facing()) {
        response.console(format!("{}: {}", command, command.description()));
    }
    response.console("execute_script {file_name}: run commands from a file");
    response.console("exit: leave the client");
    Ok(response)
}

pub async fn handle_info(ctx: HandlerContext) -> Result<Response> {
    let _guard = ctx.store.locks().acquire(OperationClass::Info).await;
    let info = ctx.store.info().await;

    let mut response = Response::ok();
    response
        .console(format!("type: {}", info.kind))
        .console(format!(
            "initialized: {}",
            info.initialized_at.format("%Y-%m-%d %H:%M:%S UTC")
        ))
        .console(format!("size: {}", info.size));
    Ok(response)
}

pub async fn handle_show(ctx: HandlerContext) -> Result<Response> {
    let _guard = ctx.store.locks().acquire(OperationClass::Show).await;
    let records = ctx.store.snapshot().await;

    let mut response = Response::ok();
    if records.is_empty() {
        response.console("the collection is empty");
        return Ok(response);
    }
    for record in &records {
        response.console(record.to_string());
        response.file(serde_json::to_string(record)?);
    }
    Ok(response)
}

pub async fn handle_add(mut ctx: HandlerContext) -> Result<Response> {
    let draft = ctx.take_record()?;
    let _guard = ctx.store.locks().acquire(OperationClass::Insert).await;

    let id = match ctx.store.allocate_id() {
        Ok(id) => id,
        Err(e) => return Ok(store_failure(ctx.command, ctx.owner(), e)),
    };
    let record = StudyGroup::from_draft(id, draft, ctx.owner());
    let repository = ctx.repository.clone();
    match ctx
        .store
        .insert_with(record, |r| repository.insert_record(r))
        .await
    {
        Ok(()) => {
            tracing::info!("{} added group {}", ctx.owner(), id);
            Ok(done(ctx.mute, format!("group {} added", id)))
        }
        Err(e) => Ok(store_failure(ctx.command, ctx.owner(), e)),
    }
}

pub async fn handle_add_if_max(mut ctx: HandlerContext) -> Result<Response> {
    let draft = ctx.take_record()?;
    let _guard = ctx.store.locks().acquire(OperationClass::InsertIfMax).await;

    let id = match ctx.store.allocate_id() {
        Ok(id) => id,
        Err(e) => return Ok(store_failure(ctx.command, ctx.owner(), e)),
    };
    let record = StudyGroup::from_draft(id, draft, ctx.owner());
    let repository = ctx.repository.clone();
    match ctx
        .store
        .insert_if_max_with(record, |r| repository.insert_record(r))
        .await
    {
        Ok(true) => Ok(done(ctx.mute, format!("group {} added", id))),
        Ok(false) => Ok(done(
            ctx.mute,
            "group not added: it is not greater than the current maximum",
        )),
        Err(e) => Ok(store_failure(ctx.command, ctx.owner(), e)),
    }
}

pub async fn handle_update(mut ctx: HandlerContext) -> Result<Response> {
    let (id, draft) = ctx.take_update()?;
    let _guard = ctx.store.locks().acquire(OperationClass::Update).await;

    let repository = ctx.repository.clone();
    match ctx
        .store
        .update_with(id, ctx.owner(), draft, |r| repository.update_record(r))
        .await
    {
        Ok(_) => Ok(done(ctx.mute, format!("group {} updated", id))),
        Err(e) => Ok(store_failure(ctx.command, ctx.owner(), e)),
    }
}

pub async fn handle_remove_by_id(mut ctx: HandlerContext) -> Result<Response> {
    let id = ctx.take_id()?;
    let _guard = ctx.store.locks().acquire(OperationClass::RemoveById).await;

    let repository = ctx.repository.clone();
    match ctx
        .store
        .remove_by_id_with(id, ctx.owner(), |ids| repository.delete_records(ids))
        .await
    {
        Ok(_) => Ok(done(ctx.mute, format!("group {} removed", id))),
        Err(e) => Ok(store_failure(ctx.command, ctx.owner(), e)),
    }
}

pub async fn handle_clear(ctx: HandlerContext) -> Result<Response> {
    let _guard = ctx.store.locks().acquire(OperationClass::Clear).await;

    let repository = ctx.repository.clone();
    match ctx
        .store
        .clear_with(ctx.owner(), |owner| {
            repository.delete_where_owner(owner).map(|_| ())
        })
        .await
    {
        Ok(removed) => Ok(done(ctx.mute, format!("{} of your groups removed", removed))),
        Err(e) => Ok(store_failure(ctx.command, ctx.owner(), e)),
    }
}

pub async fn handle_remove_greater(ctx: HandlerContext) -> Result<Response> {
    remove_relative(ctx, OperationClass::RemoveGreater).await
}

pub async fn handle_remove_lower(ctx: HandlerContext) -> Result<Response> {
    remove_relative(ctx, OperationClass::RemoveLower).await
}

/// Removes the caller's groups on one side of a reference group.
async fn remove_relative(mut ctx: HandlerContext, class: OperationClass) -> Result<Response> {
    let reference = ctx.take_id()?;
    let _guard = ctx.store.locks().acquire(class).await;

    if !ctx.store.exists(reference).await {
        return Ok(store_failure(
            ctx.command,
            ctx.owner(),
            StoreError::NotFound(reference),
        ));
    }

    let owner = ctx.auth.username.clone();
    let greater = class == OperationClass::RemoveGreater;
    let repository = ctx.repository.clone();
    let removed = ctx
        .store
        .remove_where_with(
            |r| {
                r.is_owned_by(&owner)
                    && if greater {
                        r.id > reference
                    } else {
                        r.id < reference
                    }
            },
            |ids| repository.delete_records(ids),
        )
        .await;

    match removed {
        Ok(removed) => Ok(done(
            ctx.mute,
            format!("{} of your groups removed", removed.len()),
        )),
        Err(e) => Ok(store_failure(ctx.command, &owner, e)),
    }
}

pub async fn handle_remove_any_by_group_admin(mut ctx: HandlerContext) -> Result<Response> {
    let admin = ctx.take_admin()?;
    let _guard = ctx.store.locks().acquire(OperationClass::RemoveByAdmin).await;

    let repository = ctx.repository.clone();
    match ctx
        .store
        .remove_first_matching_admin_with(&admin, ctx.owner(), |ids| {
            repository.delete_records(ids)
        })
        .await
    {
        Ok(Some(removed)) => Ok(done(ctx.mute, format!("group {} removed", removed.id))),
        Ok(None) => Ok(Response::failed(format!(
            "none of your groups is administered by {}",
            admin.name
        ))),
        Err(e) => Ok(store_failure(ctx.command, ctx.owner(), e)),
    }
}

pub async fn handle_count_by_group_admin(mut ctx: HandlerContext) -> Result<Response> {
    let admin = ctx.take_admin()?;
    let _guard = ctx.store.locks().acquire(OperationClass::CountByAdmin).await;

    let count = ctx.store.count_where(|r| r.group_admin == admin).await;
    let mut response = Response::ok();
    response.console(count.to_string());
    Ok(response)
}

pub async fn handle_group_counting_by_coordinates(ctx: HandlerContext) -> Result<Response> {
    let _guard = ctx.store.locks().acquire(OperationClass::GroupCounting).await;
    let records = ctx.store.snapshot().await;

    // Float coordinates are not hashable; groups keep first-seen order.
    let mut groups: Vec<(i32, Option<f64>, usize)> = Vec::new();
    for record in &records {
        let (x, y) = (record.coordinates.x, record.coordinates.y);
        match groups.iter_mut().find(|(gx, gy, _)| *gx == x && *gy == y) {
            Some((_, _, count)) => *count += 1,
            None => groups.push((x, y, 1)),
        }
    }

    let mut response = Response::ok();
    if groups.is_empty() {
        response.console("the collection is empty");
    }
    for (x, y, count) in groups {
        let y = y.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string());
        response.console(format!("({}, {}): {}", x, y, count));
    }
    Ok(response)
}

/// Lets the client fail fast before collecting a whole record for `update`.
pub async fn handle_check_exists(mut ctx: HandlerContext) -> Result<Response> {
    let id = ctx.take_id()?;
    let _guard = ctx.store.locks().acquire(OperationClass::CheckExists).await;

    match ctx.store.get(id).await {
        None => Ok(store_failure(ctx.command, ctx.owner(), StoreError::NotFound(id))),
        Some(record) if !record.is_owned_by(ctx.owner()) => Ok(store_failure(
            ctx.command,
            ctx.owner(),
            StoreError::NotOwner {
                id,
                owner: record.owner,
            },
        )),
        Some(_) => Ok(Response::ok()),
    }
}

/// Credentials were already verified by the dispatcher.
pub async fn handle_login(ctx: HandlerContext) -> Result<Response> {
    tracing::info!("User {} logged in", ctx.owner());
    Ok(done(ctx.mute, format!("logged in as {}", ctx.owner())))
}

pub async fn handle_register(ctx: HandlerContext) -> Result<Response> {
    let created = ctx
        .gate
        .register(&ctx.auth.username, &ctx.auth.password_digest)?;

    if created {
        Ok(done(ctx.mute, format!("user {} registered", ctx.owner())))
    } else {
        Ok(Response::failed(format!(
            "cannot register {:?}: the name is empty or taken",
            ctx.auth.username
        )))
    }
}
