//! Content protection signalling.
//!
//! Without the `protect` session feature every indication is answered with
//! `NSC` and nothing reaches the application.

use super::Context;
use crate::a2dp::AvdtpErrorCode;
use crate::a2dp::event::{Notification, SsmEvent};

pub(super) fn request(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::ApiProtectReq { data } = event else {
        return;
    };
    if ctx.options.protect {
        ctx.collab.transport.security_request(ctx.scb.handle, data);
    } else {
        debug!("[SEC] stream {} protect request without feature", ctx.scb.handle);
    }
}

pub(super) fn response(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::ApiProtectRsp { error, data } = event else {
        return;
    };
    if ctx.options.protect {
        ctx.collab
            .transport
            .security_response(ctx.scb.handle, *error, data);
    } else {
        ctx.collab
            .transport
            .security_response(ctx.scb.handle, AvdtpErrorCode::NSC, &[]);
    }
}

pub(super) fn indication(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrSecurityInd { data } = event else {
        return;
    };
    let handle = ctx.scb.handle;
    if ctx.options.protect {
        ctx.notify(Notification::ProtectRequest {
            handle,
            data: data.clone(),
        });
    } else {
        debug!("[SEC] stream {} rejecting protect indication", handle);
        ctx.collab
            .transport
            .security_response(handle, AvdtpErrorCode::NSC, &[]);
    }
}

pub(super) fn confirm(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrSecurityCfm { error, data } = event else {
        return;
    };
    if ctx.options.protect {
        let handle = ctx.scb.handle;
        ctx.notify(Notification::ProtectResponse {
            handle,
            error: *error,
            data: data.clone(),
        });
    }
}

/// Protect indication while closing
pub(super) fn reject(ctx: &mut Context<'_, '_>) {
    ctx.collab
        .transport
        .security_response(ctx.scb.handle, AvdtpErrorCode::BAD_STATE, &[]);
}
