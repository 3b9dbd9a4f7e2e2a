//! CAP negotiation and SASL authentication.

use async_trait::async_trait;
use lark_proto::caps::{is_supported, ls_tokens};
use lark_proto::sasl::{
    chunk_payload, decode_payload, decode_plain, SaslMechanism, ScramServer, ScramStep,
    MECHANISMS, SASL_CHUNK_SIZE,
};
use lark_proto::{CapSubCommand, Command, Message, Prefix};

use crate::error::HandlerResult;
use crate::handlers::registration::try_complete_registration;
use crate::handlers::{Context, Handler};
use crate::replies;

fn cap_message(ctx: &Context<'_>, subcommand: &str, args: Vec<String>) -> Message {
    let mut params = vec![ctx.nick(), subcommand.to_string()];
    params.extend(args);
    Message {
        tags: None,
        prefix: Some(Prefix::ServerName(ctx.server_name().to_string())),
        command: Command::Raw("CAP".to_string(), params),
    }
}

pub struct CapHandler;

#[async_trait]
impl Handler for CapHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::CAP(sub, ref params) = msg.command else {
            return Ok(());
        };
        match sub {
            CapSubCommand::LS => {
                if let Some(version) = params.first().and_then(|v| v.parse::<u32>().ok()) {
                    ctx.session.cap_version = ctx.session.cap_version.max(version);
                }
                if !ctx.session.registered {
                    ctx.session.cap_negotiating = true;
                }
                let tokens = ls_tokens(ctx.session.cap_version >= 302).join(" ");
                let reply = cap_message(ctx, "LS", vec![tokens]);
                ctx.send(reply);
            }
            CapSubCommand::LIST => {
                let mut enabled: Vec<String> =
                    ctx.session.caps.iter().cloned().collect();
                enabled.sort();
                let reply = cap_message(ctx, "LIST", vec![enabled.join(" ")]);
                ctx.send(reply);
            }
            CapSubCommand::REQ => {
                let requested = params.first().cloned().unwrap_or_default();
                if !ctx.session.registered {
                    ctx.session.cap_negotiating = true;
                }

                // All-or-nothing: a single unknown capability NAKs the set.
                let mut grants: Vec<(String, bool)> = Vec::new();
                let mut valid = true;
                for token in requested.split_whitespace() {
                    let (name, enable) = match token.strip_prefix('-') {
                        Some(name) => (name, false),
                        None => (token, true),
                    };
                    if !is_supported(name) {
                        valid = false;
                        break;
                    }
                    grants.push((name.to_string(), enable));
                }

                if valid && !grants.is_empty() {
                    for (name, enable) in &grants {
                        if *enable {
                            ctx.session.caps.insert(name.clone());
                        } else {
                            ctx.session.caps.remove(name);
                        }
                    }
                    // Mirror onto the live user record post-registration.
                    if let Some(user) = ctx.nexus.user(&ctx.session.uid) {
                        user.write().caps = ctx.session.caps.clone();
                    }
                    let reply = cap_message(ctx, "ACK", vec![requested]);
                    ctx.send(reply);
                } else {
                    let reply = cap_message(ctx, "NAK", vec![requested]);
                    ctx.send(reply);
                }
            }
            CapSubCommand::END => {
                if ctx.session.cap_negotiating {
                    ctx.session.cap_negotiating = false;
                    return try_complete_registration(ctx).await;
                }
            }
            _ => {
                let nick = ctx.nick();
                let reply =
                    replies::invalidcapcmd(ctx.server_name(), &nick, sub.as_str());
                ctx.send(reply);
            }
        }
        Ok(())
    }
}

pub struct AuthenticateHandler;

#[async_trait]
impl Handler for AuthenticateHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::AUTHENTICATE(ref payload) = msg.command else {
            return Ok(());
        };
        let payload = payload.clone();
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        if ctx.session.sasl.complete {
            ctx.send(replies::saslalready(&server, &nick));
            return Ok(());
        }

        // AUTHENTICATE * aborts the exchange.
        if payload == "*" {
            ctx.session.sasl.reset();
            ctx.send(replies::saslaborted(&server, &nick));
            return Ok(());
        }

        if ctx.session.sasl.mechanism.is_none() {
            match SaslMechanism::from_name(&payload) {
                Some(mechanism) => {
                    ctx.session.sasl.mechanism = Some(mechanism);
                    if mechanism == SaslMechanism::ScramSha256 {
                        ctx.session.sasl.scram = Some(ScramServer::new());
                    }
                    ctx.send(Message::from(Command::AUTHENTICATE("+".to_string())));
                }
                None => {
                    ctx.send(replies::saslmechs(&server, &nick, MECHANISMS));
                    ctx.send(replies::saslfail(&server, &nick));
                }
            }
            return Ok(());
        }

        // Chunk reassembly: a full-size chunk means more is coming.
        if payload.len() > SASL_CHUNK_SIZE {
            ctx.session.sasl.reset();
            ctx.send(replies::sasltoolong(&server, &nick));
            return Ok(());
        }
        if payload.len() == SASL_CHUNK_SIZE {
            ctx.session.sasl.buffer.push_str(&payload);
            return Ok(());
        }
        let complete = if payload == "+" {
            std::mem::take(&mut ctx.session.sasl.buffer)
        } else {
            let mut buffer = std::mem::take(&mut ctx.session.sasl.buffer);
            buffer.push_str(&payload);
            buffer
        };

        let Ok(decoded) = decode_payload(&complete) else {
            ctx.session.sasl.reset();
            ctx.send(replies::saslfail(&server, &nick));
            return Ok(());
        };

        match ctx.session.sasl.mechanism {
            Some(SaslMechanism::Plain) => self.finish_plain(ctx, &decoded).await,
            Some(SaslMechanism::External) => self.finish_external(ctx, &decoded).await,
            Some(SaslMechanism::ScramSha256) => self.step_scram(ctx, &decoded).await,
            None => Ok(()),
        }
    }
}

impl AuthenticateHandler {
    async fn finish_plain(&self, ctx: &mut Context<'_>, payload: &[u8]) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let Ok(creds) = decode_plain(payload) else {
            ctx.session.sasl.reset();
            ctx.send(replies::saslfail(&server, &nick));
            return Ok(());
        };
        if ctx
            .nexus
            .repos
            .accounts
            .verify(&creds.authcid, &creds.password)
            .await
        {
            succeed(ctx, &creds.authcid);
        } else {
            ctx.session.sasl.reset();
            ctx.send(replies::saslfail(&server, &nick));
        }
        Ok(())
    }

    async fn finish_external(&self, ctx: &mut Context<'_>, _payload: &[u8]) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let account = match ctx.session.certfp.clone() {
            Some(fp) => ctx.nexus.repos.accounts.account_for_certfp(&fp).await,
            None => None,
        };
        match account {
            Some(account) => succeed(ctx, &account),
            None => {
                ctx.session.sasl.reset();
                ctx.send(replies::saslfail(&server, &nick));
            }
        }
        Ok(())
    }

    async fn step_scram(&self, ctx: &mut Context<'_>, payload: &[u8]) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let Some(mut scram) = ctx.session.sasl.scram.take() else {
            ctx.session.sasl.reset();
            ctx.send(replies::saslfail(&server, &nick));
            return Ok(());
        };

        // First client payload opens the exchange; the second closes it.
        if ctx.session.sasl.scram_user.is_none() {
            match scram.client_first(payload) {
                Ok(ScramStep::Challenge { username, payload }) => {
                    for chunk in chunk_payload(&payload) {
                        ctx.send(Message::from(Command::AUTHENTICATE(chunk)));
                    }
                    ctx.session.sasl.scram = Some(scram);
                    ctx.session.sasl.scram_user = Some(username);
                }
                _ => {
                    ctx.session.sasl.reset();
                    ctx.send(replies::saslfail(&server, &nick));
                }
            }
            return Ok(());
        }

        let username = ctx
            .session
            .sasl
            .scram_user
            .clone()
            .unwrap_or_default();

        let Some(password) = ctx.nexus.repos.accounts.password(&username).await else {
            ctx.session.sasl.reset();
            ctx.send(replies::saslfail(&server, &nick));
            return Ok(());
        };

        match scram.finish(payload, &password) {
            Ok(ScramStep::Success { username, payload }) => {
                for chunk in chunk_payload(&payload) {
                    ctx.send(Message::from(Command::AUTHENTICATE(chunk)));
                }
                succeed(ctx, &username);
            }
            _ => {
                ctx.session.sasl.reset();
                ctx.send(replies::saslfail(&server, &nick));
            }
        }
        Ok(())
    }
}

fn succeed(ctx: &mut Context<'_>, account: &str) {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    ctx.session.account = Some(account.to_string());
    ctx.session.sasl.reset();
    ctx.session.sasl.complete = true;

    let mask = format!(
        "{}!{}@{}",
        nick,
        ctx.session.user.as_deref().unwrap_or("*"),
        ctx.session.host
    );
    ctx.send(replies::loggedin(&server, &nick, &mask, account));
    ctx.send(replies::saslsuccess(&server, &nick));

    // Mirror onto a live user record for mid-session authentication.
    if let Some(user) = ctx.nexus.user(&ctx.session.uid) {
        let mut user = user.write();
        user.account = Some(account.to_string());
        user.modes.registered = true;
    }
}
