use crate::error::{PeerId, SessionError};
use crate::session::{FlowId, Peer, Session, SessionConfig, SessionHandle, User};
use crate::store::FlowStore;
use flowcore::{FlowDocument, FlowGraph};
use flowruntime::FlowRuntime;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide lookup of live sessions by flow id and by peer.
///
/// Sessions are created on first use and stay registered until evicted,
/// even with no participants left.
pub struct SessionRegistry {
    runtime: FlowRuntime,
    store: Arc<dyn FlowStore>,
    config: SessionConfig,
    sessions: RwLock<HashMap<FlowId, SessionHandle>>,
    peers: RwLock<HashMap<PeerId, FlowId>>,
}

impl SessionRegistry {
    pub fn new(runtime: FlowRuntime, store: Arc<dyn FlowStore>, config: SessionConfig) -> Self {
        Self {
            runtime,
            store,
            config,
            sessions: RwLock::new(HashMap::new()),
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub fn runtime(&self) -> &FlowRuntime {
        &self.runtime
    }

    pub fn store(&self) -> &Arc<dyn FlowStore> {
        &self.store
    }

    pub async fn get(&self, flow_id: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(flow_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// Returns the live session for `flow_id`, loading the flow from the
    /// store (or starting from an empty graph) on first use.
    pub async fn open(&self, flow_id: &str) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.get(flow_id).await {
            return Ok(handle);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(flow_id).filter(|h| !h.is_closed()) {
            return Ok(handle.clone());
        }

        let graph = match self.store.load(flow_id).await? {
            Some(document) => document.into_graph()?,
            None => {
                tracing::info!("Flow {} not found in store; starting empty", flow_id);
                FlowGraph::new()
            }
        };
        let handle = Session::spawn(
            flow_id,
            graph,
            self.runtime.clone(),
            self.store.clone(),
            self.config.clone(),
        );
        sessions.insert(flow_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Replaces a flow with an imported document. A live session for the
    /// flow is shut down so the next subscriber sees the new graph.
    pub async fn import(&self, flow_id: &str, document: FlowDocument) -> Result<(), SessionError> {
        FlowGraph::from_document(document.clone())?;
        self.store.save(flow_id, &document).await?;
        self.evict(flow_id).await;
        Ok(())
    }

    pub async fn subscribe(
        &self,
        flow_id: &str,
        peer: Peer,
        user: User,
    ) -> Result<SessionHandle, SessionError> {
        let handle = self.open(flow_id).await?;
        let peer_id = peer.id;
        handle.subscribe(peer, user).await?;
        self.peers
            .write()
            .await
            .insert(peer_id, flow_id.to_string());
        Ok(handle)
    }

    pub async fn unsubscribe(&self, peer_id: PeerId) -> Result<bool, SessionError> {
        let Some(flow_id) = self.peers.write().await.remove(&peer_id) else {
            return Ok(false);
        };
        match self.get(&flow_id).await {
            Some(handle) => handle.unsubscribe(peer_id).await,
            None => Ok(false),
        }
    }

    pub async fn find_by_peer(&self, peer_id: PeerId) -> Option<SessionHandle> {
        let flow_id = self.peers.read().await.get(&peer_id).cloned()?;
        self.get(&flow_id).await
    }

    /// Shuts a session down and forgets it. Returns whether one was live.
    pub async fn evict(&self, flow_id: &str) -> bool {
        let Some(handle) = self.sessions.write().await.remove(flow_id) else {
            return false;
        };
        self.peers.write().await.retain(|_, f| f != flow_id);
        if let Err(error) = handle.shutdown().await {
            tracing::warn!("Evicting {}: {}", flow_id, error);
        }
        tracing::info!("Evicted session {}", flow_id);
        true
    }

    /// Evicts the session and removes the stored document.
    pub async fn delete(&self, flow_id: &str) -> Result<bool, SessionError> {
        self.evict(flow_id).await;
        Ok(self.store.delete(flow_id).await?)
    }

    pub async fn flow_ids(&self) -> Vec<FlowId> {
        let mut ids: Vec<FlowId> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
