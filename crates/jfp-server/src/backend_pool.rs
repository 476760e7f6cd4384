//! Resolves backend records into ready-to-use [`BackendClient`]s.

use jfp_core::{BackendId, Result, UserId};
use jfp_db::DbPool;

use crate::backend_client::BackendClient;
use crate::health::HealthRegistry;

#[derive(Clone)]
pub struct BackendPool {
    db: DbPool,
    health: HealthRegistry,
    json_client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl BackendPool {
    pub fn new(
        db: DbPool,
        health: HealthRegistry,
        json_client: reqwest::Client,
        stream_client: reqwest::Client,
    ) -> Self {
        Self {
            db,
            health,
            json_client,
            stream_client,
        }
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    fn build_client(
        &self,
        backend: &jfp_db::Backend,
        backend_user_id: Option<String>,
        backend_token: Option<String>,
    ) -> BackendClient {
        BackendClient::new(
            backend.id,
            backend.prefix.clone(),
            backend.name.clone(),
            backend.base_url.clone(),
            backend_user_id,
            backend_token,
            self.json_client.clone(),
            self.stream_client.clone(),
            self.health.clone(),
        )
    }

    /// Resolve a client bound to `prefix`, carrying `user`'s per-backend
    /// credentials if a mapping exists.
    pub fn for_user(&self, prefix: &str, user_id: UserId) -> Result<Option<BackendClient>> {
        let conn = jfp_db::get_conn(&self.db)?;
        let Some(backend) = jfp_db::queries::backends::get_by_prefix(&conn, prefix)? else {
            return Ok(None);
        };
        if !backend.enabled {
            return Ok(None);
        }
        let mapping = jfp_db::queries::mappings::get_for_user_backend(&conn, user_id, backend.id)?;
        let (backend_user_id, backend_token) = match mapping {
            Some(m) if m.enabled => (Some(m.backend_user_id), m.backend_token),
            _ => (None, None),
        };
        Ok(Some(self.build_client(&backend, backend_user_id, backend_token)))
    }

    /// Resolve an anonymous client bound to `prefix`, with no per-user token.
    pub fn for_backend(&self, prefix: &str) -> Result<Option<BackendClient>> {
        let conn = jfp_db::get_conn(&self.db)?;
        let Some(backend) = jfp_db::queries::backends::get_by_prefix(&conn, prefix)? else {
            return Ok(None);
        };
        if !backend.enabled {
            return Ok(None);
        }
        Ok(Some(self.build_client(&backend, None, None)))
    }

    pub fn by_id(&self, backend_id: BackendId) -> Result<Option<jfp_db::Backend>> {
        let conn = jfp_db::get_conn(&self.db)?;
        jfp_db::queries::backends::get(&conn, backend_id)
    }

    /// Resolve one client per backend `user` is mapped to, filtered down to
    /// backends the health registry currently considers available.
    pub fn all_for_user(&self, user_id: UserId) -> Result<Vec<BackendClient>> {
        let conn = jfp_db::get_conn(&self.db)?;
        let mappings = jfp_db::queries::mappings::list_for_user(&conn, user_id)?;

        let mut clients = Vec::new();
        for mapping in mappings {
            if !mapping.enabled {
                continue;
            }
            let Some(backend) = jfp_db::queries::backends::get(&conn, mapping.backend_id)? else {
                continue;
            };
            if !backend.enabled || !self.health.is_available(backend.id) {
                continue;
            }
            clients.push(self.build_client(&backend, Some(mapping.backend_user_id), mapping.backend_token));
        }
        Ok(clients)
    }

    pub fn backend_for_proxy_id(&self, proxy_id: &str) -> Result<Option<jfp_db::Backend>> {
        let Some((prefix, _)) = crate::idcodec::decode(proxy_id) else {
            return Ok(None);
        };
        let conn = jfp_db::get_conn(&self.db)?;
        jfp_db::queries::backends::get_by_prefix(&conn, prefix)
    }
}
