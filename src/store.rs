use mongodb::{
    bson::{doc, Bson, Document},
    options::{ClientOptions, FindOptions},
    sync::{Client, Collection, Database},
};
use polars::prelude::*;
use std::result::Result;

use crate::buffer::{init_buffers, FieldKind};
use crate::cluster::ClusterStatus;
use crate::config::ReportOptions;
use crate::error::Error;
use crate::readiness::StatusProbe;
use crate::report::ListingSource;

/// Handle over one listings collection plus the admin database used for
/// replica-set status probes. Passed by reference into the poller and the
/// report runner; not safe for concurrent use across threads.
pub struct ListingStore {
    admin: Database,
    collection: Collection<Document>,
    collection_name: String,
}

impl ListingStore {
    pub fn connect(options: &ReportOptions) -> Result<Self, Error> {
        let client_options = ClientOptions::parse(&options.connection_str)?;
        let client = Client::with_options(client_options)?;

        let database = client.database(&options.db);
        let collection = database.collection::<Document>(&options.collection);

        Ok(ListingStore {
            admin: client.database("admin"),
            collection,
            collection_name: options.collection.clone(),
        })
    }

    /// Streams a projected `find` over the whole collection into per-column
    /// buffers and assembles a `DataFrame` for the client-side analyses.
    pub(crate) fn load_frame(&self, fields: &[(&str, FieldKind)]) -> Result<DataFrame, Error> {
        let projection: Document = fields
            .iter()
            .map(|(name, _)| ((*name).to_string(), Bson::Int64(1)))
            .chain(std::iter::once(("_id".to_string(), Bson::Int64(0))))
            .collect();

        let find_options = FindOptions::builder().projection(projection).build();
        let cursor = self.collection.find(None, find_options)?;

        let capacity = self.collection.estimated_document_count(None)? as usize;
        let mut buffers = init_buffers(fields, capacity);

        for row in cursor {
            let doc = row?;
            for (name, buffer) in buffers.iter_mut() {
                match doc.get(name.as_str()) {
                    Some(value) => buffer.add(value),
                    None => buffer.add_null(),
                }
            }
        }

        let columns: Vec<Series> = buffers
            .into_iter()
            .map(|(_, buffer)| buffer.into_series())
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

impl ListingSource for ListingStore {
    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn count(&self, filter: Option<Document>) -> Result<u64, Error> {
        Ok(self.collection.count_documents(filter, None)?)
    }

    fn distinct(&self, field: &str, filter: Option<Document>) -> Result<Vec<Bson>, Error> {
        Ok(self.collection.distinct(field, filter, None)?)
    }

    fn find_one(&self, filter: Option<Document>) -> Result<Option<Document>, Error> {
        Ok(self.collection.find_one(filter, None)?)
    }

    fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, Error> {
        let cursor = self.collection.aggregate(pipeline, None)?;
        let mut rows = Vec::new();
        for row in cursor {
            rows.push(row?);
        }
        Ok(rows)
    }

    fn find(&self, filter: Option<Document>, options: FindOptions) -> Result<Vec<Document>, Error> {
        let cursor = self.collection.find(filter, options)?;
        let mut rows = Vec::new();
        for row in cursor {
            rows.push(row?);
        }
        Ok(rows)
    }
}

impl StatusProbe for ListingStore {
    fn cluster_status(&self) -> Result<ClusterStatus, Error> {
        let reply = self.admin.run_command(doc! { "replSetGetStatus": 1 }, None)?;
        Ok(ClusterStatus::from_document(&reply))
    }
}
