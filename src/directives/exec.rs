//! Directive execution — turns raw model output into the text actually
//! delivered, applying side effects along the way.

use super::handlers;
use super::{
    collapse_whitespace, parse_index_directives, parse_named_directives,
    strip_residual_directives, DirectiveKind, ParsedDirective,
};
use maitre_core::{
    config::ReplyTexts,
    error::MaitreError,
    traits::{BookingService, ReplyStore},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Who the directives run on behalf of.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Canonical user id.
    pub user_id: String,
    /// Display name, when known.
    pub user_name: Option<String>,
}

/// The delivered result of executing every directive in one response.
#[derive(Debug, Default)]
pub struct ExecutedReply {
    /// Final text, free of directive syntax. May be empty (nothing to send).
    pub text: String,
    /// Media file paths from canned replies, sent alongside the text.
    pub media_paths: Vec<String>,
    /// True when a directive confirmed a terminal outcome.
    pub ends_conversation: bool,
    /// Subsystem calls made, for the audit log.
    pub side_effects: Vec<String>,
}

/// Executes directives against the booking subsystem and canned-reply store.
pub struct DirectiveExecutor {
    booking: Arc<dyn BookingService>,
    replies: Arc<dyn ReplyStore>,
    texts: ReplyTexts,
}

impl DirectiveExecutor {
    pub fn new(
        booking: Arc<dyn BookingService>,
        replies: Arc<dyn ReplyStore>,
        texts: ReplyTexts,
    ) -> Self {
        Self {
            booking,
            replies,
            texts,
        }
    }

    /// Execute all directives in `raw` and produce the delivered text.
    ///
    /// Index directives are resolved from the raw string first, then named
    /// directives run in order of appearance, each replaced in place by
    /// its handler's text. A residual sweep guarantees no bracket syntax
    /// survives whatever the model produced.
    pub async fn execute(
        &self,
        raw: &str,
        ctx: &ExecutionContext,
    ) -> Result<ExecutedReply, MaitreError> {
        let indices = parse_index_directives(raw);

        if indices.is_empty() {
            let (text, ends, effects) = self.run_named(raw, ctx).await?;
            return Ok(ExecutedReply {
                text: collapse_whitespace(&strip_residual_directives(&text)),
                media_paths: Vec::new(),
                ends_conversation: ends,
                side_effects: effects,
            });
        }

        // Canned-reply path. Only the first index directive is honored;
        // the rest are stripped with it.
        let index = match &indices[0].kind {
            DirectiveKind::Canned(n) => *n,
            // parse_index_directives yields only canned entries.
            _ => unreachable!(),
        };
        let mut surrounding = String::with_capacity(raw.len());
        let mut last_end = 0;
        for directive in &indices {
            surrounding.push_str(&raw[last_end..directive.span.start]);
            last_end = directive.span.end;
        }
        surrounding.push_str(&raw[last_end..]);

        let (prose, ends, mut effects) = self.run_named(&surrounding, ctx).await?;
        let prose = collapse_whitespace(&strip_residual_directives(&prose));

        match self.replies.get_by_index(index).await? {
            Some(reply) => {
                let text = if reply.text.contains("[TEXT]") {
                    reply.text.replace("[TEXT]", prose.trim())
                } else {
                    // No splice point — the canned text stands alone.
                    if !prose.trim().is_empty() {
                        debug!("canned reply {index} has no [TEXT] placeholder, dropping prose");
                    }
                    reply.text.clone()
                };
                effects.push(format!("canned_reply({index})"));
                Ok(ExecutedReply {
                    text: collapse_whitespace(&text),
                    media_paths: reply.media_path.into_iter().collect(),
                    ends_conversation: ends,
                    side_effects: effects,
                })
            }
            None => {
                // Unknown index — drop the directive, keep the prose.
                warn!("canned reply index {index} not found");
                Ok(ExecutedReply {
                    text: prose,
                    media_paths: Vec::new(),
                    ends_conversation: ends,
                    side_effects: effects,
                })
            }
        }
    }

    /// Replace every named directive with its handler output.
    async fn run_named(
        &self,
        text: &str,
        ctx: &ExecutionContext,
    ) -> Result<(String, bool, Vec<String>), MaitreError> {
        let directives = parse_named_directives(text);
        if directives.is_empty() {
            return Ok((text.to_string(), false, Vec::new()));
        }

        let mut out = String::with_capacity(text.len());
        let mut last_end = 0;
        let mut ends_conversation = false;
        let mut side_effects = Vec::new();

        for directive in &directives {
            out.push_str(&text[last_end..directive.span.start]);
            let reply = self.dispatch(directive, ctx).await?;
            out.push_str(&reply.text);
            last_end = directive.span.end;
            ends_conversation |= reply.ends_conversation;
            if let Some(effect) = reply.side_effect {
                side_effects.push(effect);
            }
        }
        out.push_str(&text[last_end..]);

        Ok((out, ends_conversation, side_effects))
    }

    async fn dispatch(
        &self,
        directive: &ParsedDirective,
        ctx: &ExecutionContext,
    ) -> Result<handlers::HandlerReply, MaitreError> {
        match &directive.kind {
            DirectiveKind::AbortBooking => Ok(handlers::abort_booking(ctx)),
            DirectiveKind::CheckAvailability => {
                handlers::check_availability(self.booking.as_ref(), &self.texts, directive).await
            }
            DirectiveKind::ListAppointments => {
                handlers::list_appointments(self.booking.as_ref(), &self.texts, ctx).await
            }
            DirectiveKind::CancelAppointment => {
                handlers::cancel_appointment(self.booking.as_ref(), &self.texts, directive).await
            }
            DirectiveKind::BookAppointment => {
                handlers::book_appointment(self.booking.as_ref(), &self.texts, ctx, directive).await
            }
            DirectiveKind::Unknown(name) => {
                // Not in the vocabulary: drop silently rather than echo
                // bracket syntax to the user.
                debug!("dropping unknown directive [{name}]");
                Ok(handlers::HandlerReply::default())
            }
            // Index directives never reach named dispatch.
            DirectiveKind::Canned(_) => Ok(handlers::HandlerReply::default()),
        }
    }
}
