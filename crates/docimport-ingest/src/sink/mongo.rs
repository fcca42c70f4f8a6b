//! MongoDB sink

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, Credential};
use mongodb::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Sink;
use crate::error::SinkError;
use crate::hooks::Record;

/// Deadline for establishing the connection and selecting a server
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConnection {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Default target database for sources that do not name one
    pub database: Option<String>,
    /// Database holding the user's credentials
    pub auth_database: Option<String>,
}

impl Default for MongoConnection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            user: None,
            password: None,
            database: None,
            auth_database: None,
        }
    }
}

impl MongoConnection {
    /// Connection string without credentials; those are attached separately so
    /// they never need URL escaping.
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}/", self.host, self.port)
    }

    fn credential(&self) -> Option<Credential> {
        let user = self.user.as_ref().filter(|u| !u.is_empty())?;
        let mut credential = Credential::default();
        credential.username = Some(user.clone());
        credential.password = self.password.clone();
        credential.source = Some(
            self.auth_database
                .clone()
                .unwrap_or_else(|| "admin".to_string()),
        );
        Some(credential)
    }
}

/// Sink writing through the official driver
pub struct MongoSink {
    client: Client,
}

impl MongoSink {
    /// Connect and verify the server answers a ping within [`CONNECT_TIMEOUT`].
    pub async fn connect(connection: &MongoConnection) -> Result<Self, SinkError> {
        let mut options = ClientOptions::parse(connection.uri()).await?;
        options.app_name = Some("docimport".to_string());
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);
        options.credential = connection.credential();

        let client = Client::with_options(options)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!(host = %connection.host, port = connection.port, "Connected to MongoDB");
        Ok(Self { client })
    }

    fn collection(&self, database: &str, collection: &str) -> mongodb::Collection<Document> {
        self.client.database(database).collection(collection)
    }
}

fn to_document(record: &Record) -> Result<Document, SinkError> {
    Ok(mongodb::bson::to_document(record)?)
}

#[async_trait]
impl Sink for MongoSink {
    async fn bulk_insert(&self, database: &str, collection: &str, records: Vec<Record>) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        let documents = records
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>, _>>()?;

        let result = self
            .collection(database, collection)
            .insert_many(documents)
            .await?;
        debug!(database, collection, inserted = result.inserted_ids.len(), "Inserted batch");
        Ok(())
    }

    async fn upsert_batch(
        &self,
        database: &str,
        collection: &str,
        batch: Vec<(Record, Record)>,
    ) -> Result<(), SinkError> {
        let target = self.collection(database, collection);
        for (filter, record) in &batch {
            target
                .replace_one(to_document(filter)?, to_document(record)?)
                .upsert(true)
                .await?;
        }
        debug!(database, collection, upserted = batch.len(), "Upserted batch");
        Ok(())
    }

    async fn clear_collection(&self, database: &str, collection: &str) -> Result<(), SinkError> {
        self.collection(database, collection).drop().await?;
        info!(database, collection, "Dropped collection");
        Ok(())
    }
}
