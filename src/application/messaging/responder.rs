//! Per-invocation response handle

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use crate::application::errors::BotError;
use crate::domain::entities::InteractionRef;
use crate::domain::traits::{Gateway, InteractionResponse, Reply, SentMessage};

/// Where an interaction stands with respect to its initial response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseState {
    #[default]
    Pending,
    Replied,
    Deferred,
}

/// Answers one interaction, remembering whether it was already acknowledged
pub struct Responder {
    gateway: Arc<dyn Gateway>,
    interaction: InteractionRef,
    state: Mutex<ResponseState>,
}

impl Responder {
    pub fn new(gateway: Arc<dyn Gateway>, interaction: InteractionRef) -> Self {
        Self {
            gateway,
            interaction,
            state: Mutex::new(ResponseState::Pending),
        }
    }

    pub fn state(&self) -> ResponseState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ResponseState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Replied or deferred
    pub fn has_responded(&self) -> bool {
        self.state() != ResponseState::Pending
    }

    fn ensure_pending(&self) -> Result<(), BotError> {
        if self.has_responded() {
            return Err(BotError::Interaction(format!(
                "interaction {} already acknowledged",
                self.interaction.id
            )));
        }
        Ok(())
    }

    fn ensure_acknowledged(&self) -> Result<(), BotError> {
        if !self.has_responded() {
            return Err(BotError::Interaction(format!(
                "interaction {} has not been acknowledged yet",
                self.interaction.id
            )));
        }
        Ok(())
    }

    pub async fn reply(&self, reply: Reply) -> Result<SentMessage, BotError> {
        self.ensure_pending()?;
        let sent = self
            .gateway
            .respond(&self.interaction, InteractionResponse::Message(reply))
            .await?;
        self.set_state(ResponseState::Replied);
        // Some platforms don't echo the created message back.
        Ok(sent.unwrap_or_else(|| SentMessage {
            id: self.interaction.id.clone(),
            created_at: Utc::now(),
        }))
    }

    pub async fn defer(&self, ephemeral: bool) -> Result<(), BotError> {
        self.ensure_pending()?;
        self.gateway
            .respond(&self.interaction, InteractionResponse::Deferred { ephemeral })
            .await?;
        self.set_state(ResponseState::Deferred);
        Ok(())
    }

    pub async fn edit_reply(&self, content: &str) -> Result<(), BotError> {
        self.ensure_acknowledged()?;
        self.gateway.edit_reply(&self.interaction, content).await
    }

    pub async fn follow_up(&self, reply: Reply) -> Result<SentMessage, BotError> {
        self.ensure_acknowledged()?;
        self.gateway.follow_up(&self.interaction, &reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::console::{ConsoleGateway, Outgoing};

    fn interaction() -> InteractionRef {
        InteractionRef {
            id: "1".into(),
            token: "tok".into(),
            application_id: "app".into(),
        }
    }

    #[tokio::test]
    async fn test_reply_then_second_reply_fails() {
        let gateway = Arc::new(ConsoleGateway::new());
        let responder = Responder::new(gateway.clone(), interaction());
        responder.reply(Reply::new("hi")).await.unwrap();
        assert_eq!(responder.state(), ResponseState::Replied);
        assert!(responder.reply(Reply::new("again")).await.is_err());
        assert_eq!(gateway.outgoing().len(), 1);
    }

    #[tokio::test]
    async fn test_edit_requires_acknowledgment() {
        let gateway = Arc::new(ConsoleGateway::new());
        let responder = Responder::new(gateway.clone(), interaction());
        assert!(responder.edit_reply("too early").await.is_err());

        responder.defer(true).await.unwrap();
        assert_eq!(responder.state(), ResponseState::Deferred);
        responder.edit_reply("done").await.unwrap();

        let outgoing = gateway.outgoing();
        assert!(matches!(outgoing[0], Outgoing::Deferred { ephemeral: true, .. }));
        assert!(matches!(&outgoing[1], Outgoing::Edit { content, .. } if content == "done"));
    }

    #[tokio::test]
    async fn test_failed_reply_leaves_state_pending() {
        let gateway = Arc::new(ConsoleGateway::new());
        gateway.fail_responses(true);
        let responder = Responder::new(gateway.clone(), interaction());
        assert!(responder.reply(Reply::new("lost")).await.is_err());
        assert!(!responder.has_responded());
    }
}
