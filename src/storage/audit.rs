//! SQLite audit store: score results, scoring failures and registry artifacts.
//! Failure records embed the full transaction for manual review, so their payload is
//! AES-GCM encrypted with a key derived from a deployment secret.

use super::AuditSink;
use crate::error::StorageError;
use crate::registry::ModelArtifact;
use crate::scoring::{ScoreResult, ScoringFailure};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

const META_ACTIVE_VERSION: &str = "registry.active_version";
const META_NEXT_VERSION: &str = "registry.next_version";

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, StorageError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| StorageError::Crypto)?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|_| StorageError::Crypto)?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>, StorageError> {
    let raw = BASE64.decode(encoded)?;
    if raw.len() < NONCE_LEN {
        return Err(StorageError::Corrupt("payload too short".into()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| StorageError::Crypto)?;
    cipher.decrypt(nonce.into(), ct).map_err(|_| StorageError::Crypto)
}

/// One atomic registry mutation: optional new artifact, new active pointer, pruned versions.
#[derive(Debug)]
pub struct RegistryChange<'a> {
    pub insert: Option<&'a ModelArtifact>,
    pub active_version: u64,
    pub next_version: u64,
    pub remove: &'a [u64],
}

/// Registry pointers as last persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryState {
    pub active_version: Option<u64>,
    pub next_version: Option<u64>,
}

pub struct AuditStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl AuditStore {
    /// Open or create the store at `path`. The failure-record key is derived from `secret`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS score_results (
                id TEXT PRIMARY KEY,
                transaction_id TEXT NOT NULL,
                model_version INTEGER NOT NULL,
                fraud_probability REAL NOT NULL,
                decision TEXT NOT NULL,
                scored_at INTEGER NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_scores_tx ON score_results(transaction_id);
            CREATE INDEX IF NOT EXISTS idx_scores_model ON score_results(model_version, scored_at);
            CREATE TABLE IF NOT EXISTS scoring_failures (
                id TEXT PRIMARY KEY,
                transaction_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                occurred_at INTEGER NOT NULL,
                payload_enc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_failures_ts ON scoring_failures(occurred_at);
            CREATE TABLE IF NOT EXISTS model_artifacts (
                version INTEGER PRIMARY KEY,
                published_at INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS meta (k TEXT PRIMARY KEY, v TEXT);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    pub fn insert_score(&self, result: &ScoreResult) -> Result<(), StorageError> {
        let payload = serde_json::to_string(result)?;
        self.conn.lock().execute(
            "INSERT INTO score_results (id, transaction_id, model_version, fraud_probability, decision, scored_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                result.id,
                result.transaction_id,
                result.model_version as i64,
                result.fraud_probability,
                result.decision.as_str(),
                result.scored_at.timestamp_millis(),
                payload
            ],
        )?;
        Ok(())
    }

    /// Insert a failure record (payload stored encrypted)
    pub fn insert_failure(&self, failure: &ScoringFailure) -> Result<(), StorageError> {
        let enc = encrypt(&self.key, &serde_json::to_vec(failure)?)?;
        self.conn.lock().execute(
            "INSERT INTO scoring_failures (id, transaction_id, kind, occurred_at, payload_enc)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                failure.id,
                failure.transaction_id,
                failure.kind.as_str(),
                failure.occurred_at.timestamp_millis(),
                enc
            ],
        )?;
        Ok(())
    }

    pub fn scores_for_transaction(&self, transaction_id: &str) -> Result<Vec<ScoreResult>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT payload FROM score_results WHERE transaction_id = ?1 ORDER BY scored_at, id",
        )?;
        let payloads = stmt
            .query_map(params![transaction_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StorageError::from))
            .collect()
    }

    /// Most recent fraud probabilities produced by `model_version`, newest first.
    pub fn recent_probabilities(&self, model_version: u64, limit: usize) -> Result<Vec<f64>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT fraud_probability FROM score_results WHERE model_version = ?1
             ORDER BY scored_at DESC LIMIT ?2",
        )?;
        let scores = stmt
            .query_map(params![model_version as i64, limit as i64], |row| row.get::<_, f64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(scores)
    }

    pub fn score_count(&self) -> Result<u64, StorageError> {
        let n: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM score_results", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Most recent failure records, newest first (decrypted).
    pub fn recent_failures(&self, limit: usize) -> Result<Vec<ScoringFailure>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT payload_enc FROM scoring_failures ORDER BY occurred_at DESC, id LIMIT ?1",
        )?;
        let encoded = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        encoded
            .iter()
            .map(|enc| -> Result<ScoringFailure, StorageError> {
                let plain = decrypt(&self.key, enc)?;
                Ok(serde_json::from_slice(&plain)?)
            })
            .collect()
    }

    /// Retention: delete score and failure records older than `cutoff`
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let ts = cutoff.timestamp_millis();
        let conn = self.conn.lock();
        let scores = conn.execute("DELETE FROM score_results WHERE scored_at < ?1", params![ts])?;
        let failures = conn.execute("DELETE FROM scoring_failures WHERE occurred_at < ?1", params![ts])?;
        Ok((scores + failures) as u64)
    }

    pub fn load_artifacts(&self) -> Result<Vec<ModelArtifact>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT version, payload FROM model_artifacts ORDER BY version")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(version, payload)| -> Result<ModelArtifact, StorageError> {
                let artifact: ModelArtifact = serde_json::from_str(&payload)?;
                if artifact.version != version as u64 {
                    return Err(StorageError::Corrupt(format!(
                        "artifact row {} holds version {}",
                        version, artifact.version
                    )));
                }
                Ok(artifact)
            })
            .collect()
    }

    pub fn registry_state(&self) -> Result<RegistryState, StorageError> {
        let conn = self.conn.lock();
        let read = |k: &str| -> Result<Option<u64>, StorageError> {
            let v: Option<String> = conn
                .query_row("SELECT v FROM meta WHERE k = ?1", params![k], |row| row.get(0))
                .optional()?;
            v.map(|s| {
                s.parse::<u64>()
                    .map_err(|_| StorageError::Corrupt(format!("meta {k} = {s:?}")))
            })
            .transpose()
        };
        Ok(RegistryState {
            active_version: read(META_ACTIVE_VERSION)?,
            next_version: read(META_NEXT_VERSION)?,
        })
    }

    /// Apply a registry mutation in a single transaction.
    pub fn apply_registry_change(&self, change: &RegistryChange<'_>) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if let Some(artifact) = change.insert {
            tx.execute(
                "INSERT OR REPLACE INTO model_artifacts (version, published_at, checksum, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    artifact.version as i64,
                    artifact.published_at.timestamp_millis(),
                    artifact.checksum,
                    serde_json::to_string(artifact)?
                ],
            )?;
        }
        for version in change.remove {
            tx.execute(
                "DELETE FROM model_artifacts WHERE version = ?1",
                params![*version as i64],
            )?;
        }
        for (k, v) in [
            (META_ACTIVE_VERSION, change.active_version),
            (META_NEXT_VERSION, change.next_version),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO meta (k, v) VALUES (?1, ?2)",
                params![k, v.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl AuditSink for AuditStore {
    fn record_score(&self, result: &ScoreResult) -> Result<(), StorageError> {
        self.insert_score(result)
    }

    fn record_failure(&self, failure: &ScoringFailure) -> Result<(), StorageError> {
        self.insert_failure(failure)
    }
}
