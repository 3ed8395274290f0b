//! Privileged entry point and the middleware that wraps it.
//!
//! Middleware is plain composition: each layer owns its inner entry point and
//! decides whether to forward the call. The host wires
//! `AuthGate<SingleRun<UpdateCommand<..>>>`, so an unauthorized caller is
//! rejected before it can ever observe a busy run.

use std::sync::{Mutex, TryLockError};

use anyhow::Result;
use tracing::{info, warn};

use crate::core::messages::Reply;
use crate::core::types::{AuthorizedPrincipals, Outcome, PrincipalId};
use crate::io::responder::Responder;

/// What the entry point did for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Caller was not authorized; nothing ran.
    Rejected,
    /// Another run was in flight; nothing ran.
    Busy,
    /// The pipeline ran to completion.
    ///
    /// `restarted` is only ever observed as true with a restarter that
    /// returns, since a real restart replaces the process.
    Completed { outcome: Outcome, restarted: bool },
}

pub trait EntryPoint {
    fn invoke(&self, caller: &PrincipalId, responder: &mut dyn Responder) -> Result<Invocation>;
}

/// Forward only callers in the authorized set.
#[derive(Debug)]
pub struct AuthGate<E> {
    principals: AuthorizedPrincipals,
    inner: E,
}

impl<E> AuthGate<E> {
    pub fn new(principals: AuthorizedPrincipals, inner: E) -> Self {
        Self { principals, inner }
    }
}

impl<E: EntryPoint> EntryPoint for AuthGate<E> {
    fn invoke(&self, caller: &PrincipalId, responder: &mut dyn Responder) -> Result<Invocation> {
        if !self.principals.contains(caller) {
            warn!(caller = %caller, "unauthorized update attempt");
            send_reply(responder, &Reply::rejection());
            return Ok(Invocation::Rejected);
        }
        self.inner.invoke(caller, responder)
    }
}

/// Allow at most one inner invocation in flight; concurrent callers get `Busy`.
#[derive(Debug, Default)]
pub struct SingleRun<E> {
    inner: E,
    lock: Mutex<()>,
}

impl<E> SingleRun<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }
}

impl<E: EntryPoint> EntryPoint for SingleRun<E> {
    fn invoke(&self, caller: &PrincipalId, responder: &mut dyn Responder) -> Result<Invocation> {
        let _guard = match self.lock.try_lock() {
            Ok(guard) => guard,
            // A panicked run leaves nothing to protect; the working copy is
            // owned by the external commands.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                info!(caller = %caller, "update already in progress");
                send_reply(responder, &Reply::busy());
                return Ok(Invocation::Busy);
            }
        };
        self.inner.invoke(caller, responder)
    }
}

/// Deliver a reply; delivery failures are logged and never abort the run.
pub(crate) fn send_reply(responder: &mut dyn Responder, reply: &Reply) {
    if let Err(err) = responder.reply(reply) {
        warn!(err = %format!("{err:#}"), kind = ?reply.kind, "failed to deliver reply");
    }
}
