//! The per-request state machine, invoked once per dequeue of a request
//! handle from the engine work queue.
//!
//! One invocation either walks the request forward until it must suspend
//! (parked in its notifier, waiting for a broker, the controller or a
//! response) or finishes it: post exactly one result event, then tear the
//! request down.

use tokio::time::Instant;

use weir_admin_core::AdminError;

use crate::api::{AdminEvent, AdminOp, ConfigsResult, TopicsResult};
use crate::cluster::{BrokerRef, Responder};
use crate::engine::EngineRuntime;
use crate::protocol::{adapter_for, ResultPayload};
use crate::request::{AdminRequest, RequestState, CONTROLLER};

/// Outcome of one worker invocation, for callers that care whether the
/// handle is still alive somewhere.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Served {
    /// The request suspended; it is parked in its notifier.
    Kept,
    /// The request finished and was torn down.
    Destroyed,
}

pub(crate) fn serve(rt: &mut EngineRuntime, mut req: Box<AdminRequest>) -> Served {
    let name = req.op.name();

    if rt.shared.is_stopping() {
        tracing::debug!(
            request_id = req.id,
            state = req.state.desc(),
            "{name} worker called while engine is stopping, discarding"
        );
        return destroy(rt, req);
    }

    // Errors raised asynchronously by whichever source woke us.
    match req.last_error.take() {
        None => {}
        Some(AdminError::Destroyed) => return destroy(rt, req),
        Some(err) => {
            tracing::debug!(
                request_id = req.id,
                state = req.state.desc(),
                "{name} worker woken with error: {err}"
            );
            let err = match err {
                // The timer only knows the deadline passed; the stage the
                // request was stuck in is worth reporting.
                AdminError::TimedOut(_) => {
                    AdminError::TimedOut(format!("while {}", req.state.desc()))
                }
                other => other,
            };
            post_failure(&req, err);
            return destroy(rt, req);
        }
    }

    if Instant::now() >= req.deadline {
        post_failure(&req, AdminError::TimedOut(format!("while {}", req.state.desc())));
        return destroy(rt, req);
    }

    let mut broker: Option<BrokerRef> = None;

    loop {
        match req.state {
            RequestState::Init => {
                let notifier = req.notifier();

                // Arm the one-shot timeout timer. Timers only ever start
                // here, on the engine task.
                let deadline = req.deadline;
                let timer_notifier = notifier.clone();
                req.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    timer_notifier.trigger(
                        Some(AdminError::TimedOut("at the request deadline".into())),
                        "timer timeout",
                    );
                }));

                rt.outstanding.insert(req.id, notifier);

                if req.options.broker_id() != CONTROLLER {
                    tracing::debug!(
                        request_id = req.id,
                        broker_id = req.options.broker_id(),
                        "{name}: using explicitly set broker id"
                    );
                    req.broker_id = req.options.broker_id();
                }

                req.state = if req.broker_id != CONTROLLER {
                    RequestState::WaitBroker
                } else {
                    RequestState::WaitController
                };
            }

            RequestState::WaitBroker | RequestState::WaitController => {
                let wait_controller = req.state == RequestState::WaitController;
                let target = req.broker_id;
                let notifier = req.notifier();
                tracing::debug!(
                    request_id = req.id,
                    broker_id = target,
                    "{name}: looking up {}",
                    if wait_controller { "controller" } else { "broker" }
                );

                // Park before the lookup so a wake source firing between
                // registration and our return cannot be lost.
                let request_id = req.id;
                notifier.park(req, rt.ops_tx.clone());
                let found = if wait_controller {
                    rt.shared.cluster.controller_up_async(notifier.clone())
                } else {
                    rt.shared.cluster.broker_up_async(target, notifier.clone())
                };

                let Some(rkb) = found else {
                    // Not available yet. The handle stays with the
                    // notifier; the next broker state change (or the
                    // timer) reposts it.
                    return Served::Kept;
                };

                let Some((reclaimed, _)) = notifier.disable() else {
                    // A racing wake-up claimed the handle first; it is
                    // already back on the work queue.
                    tracing::trace!(request_id, "broker lookup lost the wake race");
                    return Served::Kept;
                };
                req = reclaimed;

                tracing::debug!(request_id = req.id, broker_id = rkb.id(), "{name}: broker is up");
                broker = Some(rkb);
                req.state = RequestState::ConstructRequest;
            }

            RequestState::ConstructRequest => {
                let rkb = broker.take().expect("broker ref set by the wait state");

                let adapter = adapter_for(req.op);
                let wire = match (adapter.build)(&req, &rkb) {
                    Ok(wire) => wire,
                    Err(err) => {
                        post_failure(&req, err);
                        return destroy(rt, req);
                    }
                };

                // Park before dispatching the send: the response (or the
                // timer, if we time out while waiting) wakes us through
                // the notifier.
                let notifier = req.notifier();
                let api_key = wire.api_key;
                req.state = RequestState::WaitResponse;
                notifier.park(req, rt.ops_tx.clone());

                if let Err(err) = rkb.send(wire, Responder::new(notifier.clone(), api_key)) {
                    return match notifier.disable() {
                        Some((reclaimed, _)) => {
                            let req = reclaimed;
                            post_failure(&req, err);
                            destroy(rt, req)
                        }
                        // Claimed by a racing wake-up; it will surface on
                        // the work queue with its own error.
                        None => Served::Kept,
                    };
                }
                return Served::Kept;
            }

            RequestState::WaitResponse => {
                let Some(mut reply) = req.reply_buf.take() else {
                    post_failure(
                        &req,
                        AdminError::Transport(
                            "woken while waiting for response, but no response attached".into(),
                        ),
                    );
                    return destroy(rt, req);
                };

                let adapter = adapter_for(req.op);
                let parsed = (adapter.parse)(&req, &mut reply);
                if let Some(throttle_ms) = reply.throttle_ms {
                    rt.shared.note_throttle(reply.broker_id, throttle_ms);
                }

                match parsed {
                    Ok(payload) => post_result(&req, payload),
                    Err(reason) => post_failure(
                        &req,
                        AdminError::BadMessage(format!(
                            "{name} worker failed to parse response: {reason}"
                        )),
                    ),
                }
                return destroy(rt, req);
            }
        }
    }
}

/// Terminal transition: stop the timer, sever the handle→notifier link and
/// deregister. The handle itself is dropped here.
fn destroy(rt: &mut EngineRuntime, mut req: Box<AdminRequest>) -> Served {
    if let Some(timer) = req.timer.take() {
        timer.abort();
    }
    req.notifier = None;
    rt.outstanding.remove(&req.id);
    tracing::trace!(request_id = req.id, "admin request destroyed");
    Served::Destroyed
}

fn post_failure(req: &AdminRequest, err: AdminError) {
    tracing::debug!(
        request_id = req.id,
        "admin {} result error: {err}",
        req.op.name()
    );
    post_event(req, Some(err), ResultPayload::empty_for(req.op));
}

fn post_result(req: &AdminRequest, payload: ResultPayload) {
    post_event(req, None, payload);
}

fn post_event(req: &AdminRequest, error: Option<AdminError>, payload: ResultPayload) {
    let opaque = req.options.opaque().cloned();
    let event = match (req.op, payload) {
        (AdminOp::CreateTopics, ResultPayload::Topics(topics)) => {
            AdminEvent::CreateTopics(TopicsResult { error, topics, opaque })
        }
        (AdminOp::DeleteTopics, ResultPayload::Topics(topics)) => {
            AdminEvent::DeleteTopics(TopicsResult { error, topics, opaque })
        }
        (AdminOp::CreatePartitions, ResultPayload::Topics(topics)) => {
            AdminEvent::CreatePartitions(TopicsResult { error, topics, opaque })
        }
        (AdminOp::AlterConfigs, ResultPayload::Configs(resources)) => {
            AdminEvent::AlterConfigs(ConfigsResult { error, resources, opaque })
        }
        (AdminOp::DescribeConfigs, ResultPayload::Configs(resources)) => {
            AdminEvent::DescribeConfigs(ConfigsResult { error, resources, opaque })
        }
        _ => unreachable!("payload shape does not match the request op"),
    };

    if req.reply_tx.send(event).is_err() {
        tracing::debug!(request_id = req.id, "application reply queue closed, dropping result");
    }
}
