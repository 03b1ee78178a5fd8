// ─── Database Handle ───
// Uniform view over a connection, a schema, or a single model supplied by
// the caller's ORM layer.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ResourceHandle;
use crate::core::error::{AccessError, AccessResult};

/// Object-mapping style of the caller's ORM.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrmKind {
    Peewee,
    Sqla,
}

impl OrmKind {
    /// Package segment used in dot-qualified schema names.
    pub fn package(self) -> &'static str {
        match self {
            OrmKind::Peewee => "peewee",
            OrmKind::Sqla => "sqlalchemy",
        }
    }
}

impl fmt::Display for OrmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmKind::Peewee => write!(f, "peewee"),
            OrmKind::Sqla => write!(f, "sqla"),
        }
    }
}

/// A live database connection owned by the caller's ORM layer.
pub trait DatabaseConnection: Send + Sync + fmt::Debug {
    fn dbname(&self) -> &str;
    fn orm(&self) -> OrmKind;
    fn is_connected(&self) -> bool;
    /// Model names of a schema in this database, if it exists.
    fn schema_models(&self, schema: &str) -> Option<Vec<String>>;
    fn close(&self);
}

/// A schema: its name, its models, and the connection it lives on.
#[derive(Debug, Clone)]
pub struct SchemaDef {
    pub name: String,
    pub orm: OrmKind,
    pub models: Vec<String>,
    pub connection: Option<Arc<dyn DatabaseConnection>>,
}

impl SchemaDef {
    pub fn from_connection(
        connection: Arc<dyn DatabaseConnection>,
        name: &str,
    ) -> AccessResult<Self> {
        let models = connection.schema_models(name).ok_or_else(|| {
            AccessError::Database(format!(
                "no schema {name} found in database {}",
                connection.dbname()
            ))
        })?;
        Ok(Self {
            name: name.to_string(),
            orm: connection.orm(),
            models,
            connection: Some(connection),
        })
    }

    pub fn model(&self, name: &str) -> AccessResult<ModelDef> {
        if !self.models.iter().any(|m| m == name) {
            return Err(AccessError::Database(format!(
                "schema {} does not have model {name}",
                self.name
            )));
        }
        Ok(ModelDef {
            name: name.to_string(),
            schema: self.clone(),
        })
    }
}

/// A single model together with the schema it belongs to.
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub schema: SchemaDef,
}

/// What a database handle can be built from.
#[derive(Debug, Clone)]
pub enum DbInput {
    Connection(Arc<dyn DatabaseConnection>),
    Schema(SchemaDef),
    Model(ModelDef),
}

/// Database side of the resource handles.
///
/// Information only flows top-down: a bare connection knows no schema or
/// model, a schema knows its models, a model knows its schema and
/// connection. `load_schema` and `load_model` narrow or widen afterwards.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    db: Option<Arc<dyn DatabaseConnection>>,
    orm: OrmKind,
    schema: Option<SchemaDef>,
    model: Option<String>,
    shared: bool,
    closed: bool,
}

impl DatabaseHandle {
    pub fn new(input: DbInput) -> Self {
        let (db, orm, schema, model) = match input {
            DbInput::Connection(conn) => {
                let orm = conn.orm();
                (Some(conn), orm, None, None)
            }
            DbInput::Schema(schema) => {
                (schema.connection.clone(), schema.orm, Some(schema), None)
            }
            DbInput::Model(model) => (
                model.schema.connection.clone(),
                model.schema.orm,
                Some(model.schema),
                Some(model.name),
            ),
        };
        Self {
            db,
            orm,
            schema,
            model,
            shared: false,
            closed: false,
        }
    }

    /// Mark the handle as borrowed from a shared default; closing it then
    /// releases the handle without closing the connection.
    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn orm(&self) -> OrmKind {
        self.orm
    }

    pub fn dbname(&self) -> Option<&str> {
        self.db.as_deref().map(|d| d.dbname())
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_ref().map(|s| s.name.as_str())
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Models of the loaded schema; empty for a bare connection.
    pub fn models(&self) -> &[String] {
        self.schema
            .as_ref()
            .map(|s| s.models.as_slice())
            .unwrap_or_default()
    }

    pub fn connection(&self) -> Option<&Arc<dyn DatabaseConnection>> {
        self.db.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Load a schema from the current database.
    ///
    /// The name may be dot-qualified as `[orm.][database.]schema`; given
    /// qualifiers must match the current connection.
    pub fn load_schema(&mut self, name: &str) -> AccessResult<()> {
        let db = self
            .db
            .clone()
            .ok_or_else(|| AccessError::Database(format!("no db present, cannot load schema {name}")))?;

        let parts: Vec<&str> = name.split('.').collect();
        let (orm, dbname, schema) = match parts.as_slice() {
            [schema] => (None, None, *schema),
            [dbname, schema] => (None, Some(*dbname), *schema),
            [orm, dbname, schema] => (Some(*orm), Some(*dbname), *schema),
            _ => {
                return Err(AccessError::Database(format!(
                    "schema name {name} has too many qualifiers"
                )))
            }
        };
        if let Some(orm) = orm.filter(|o| *o != self.orm.package() && *o != self.orm.to_string()) {
            return Err(AccessError::Database(format!(
                "schema {name} is for orm {orm}, handle uses {}",
                self.orm
            )));
        }
        if let Some(dbname) = dbname.filter(|d| *d != db.dbname()) {
            return Err(AccessError::Database(format!(
                "schema {name} is in database {dbname}, handle is connected to {}",
                db.dbname()
            )));
        }

        self.schema = Some(SchemaDef::from_connection(db, schema)?);
        self.model = None;
        debug!("Loaded schema {schema}");
        Ok(())
    }

    /// Load a model from the current schema.
    pub fn load_model(&mut self, name: &str) -> AccessResult<()> {
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| AccessError::Database("no schema set containing ORM models".into()))?;
        let model = schema.model(name)?;
        self.model = Some(model.name);
        Ok(())
    }
}

impl ResourceHandle for DatabaseHandle {
    fn is_connected(&self) -> bool {
        !self.closed && self.db.as_ref().is_some_and(|d| d.is_connected())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let (Some(db), false) = (&self.db, self.shared) {
            db.close();
            debug!("Closed database connection {}", db.dbname());
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    pub struct MemoryDb {
        pub name: String,
        pub orm: OrmKind,
        pub schemas: BTreeMap<String, Vec<String>>,
        pub connected: AtomicBool,
        pub closes: AtomicUsize,
    }

    impl MemoryDb {
        pub fn sdss5db() -> Arc<Self> {
            Arc::new(Self {
                name: "sdss5db".into(),
                orm: OrmKind::Peewee,
                schemas: BTreeMap::from([
                    ("targetdb".into(), vec!["Target".into(), "Carton".into()]),
                    ("catalogdb".into(), vec!["Catalog".into()]),
                ]),
                connected: AtomicBool::new(true),
                closes: AtomicUsize::new(0),
            })
        }
    }

    impl DatabaseConnection for MemoryDb {
        fn dbname(&self) -> &str {
            &self.name
        }

        fn orm(&self) -> OrmKind {
            self.orm
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn schema_models(&self, schema: &str) -> Option<Vec<String>> {
            self.schemas.get(schema).cloned()
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
        }
    }
}
