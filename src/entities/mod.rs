//! Entity declarations: the six record kinds served under `/api/*`,
//! their columns, owner links, includable relations and write payloads.

pub mod organization;
pub mod performance_assessment;
pub mod reservation;
pub mod usage;
pub mod user;
pub mod vehicle;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::database::Changes;

pub use organization::{Organization, OrganizationPayload};
pub use performance_assessment::{PerformanceAssessment, PerformanceAssessmentPayload};
pub use reservation::{Reservation, ReservationPayload};
pub use usage::{Usage, UsagePayload};
pub use user::{User, UserPayload};
pub use vehicle::{Vehicle, VehiclePayload};

/// Column holding the tenant on the entities that anchor ownership
pub const TENANT_COLUMN: &str = "tenant_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Vehicle,
    Usage,
    PerformanceAssessment,
    Reservation,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Integer,
    Timestamp,
}

impl ColumnType {
    /// Placeholder cast so JSON-bound filter values compare against typed columns
    pub fn sql_cast(&self) -> &'static str {
        match self {
            ColumnType::Uuid => "::uuid",
            ColumnType::Text => "",
            ColumnType::Integer => "::bigint",
            ColumnType::Timestamp => "::timestamptz",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// `column` lives on this entity and points at `target.id`
    BelongsTo,
    /// `column` lives on `target` and points at this entity's id
    HasMany,
}

#[derive(Debug, Clone, Copy)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    pub column: &'static str,
    pub target: EntityKind,
}

const fn belongs_to(name: &'static str, column: &'static str, target: EntityKind) -> Relation {
    Relation { name, kind: RelationKind::BelongsTo, column, target }
}

const fn has_many(name: &'static str, column: &'static str, target: EntityKind) -> Relation {
    Relation { name, kind: RelationKind::HasMany, column, target }
}

/// Link followed to find the tenant that owns a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Tenant,
    Parent { column: &'static str, kind: EntityKind },
}

const ORGANIZATION_COLUMNS: &[Column] = &[
    col("id", ColumnType::Uuid),
    col("name", ColumnType::Text),
    col("description", ColumnType::Text),
    col("tenant_id", ColumnType::Text),
    col("created_at", ColumnType::Timestamp),
    col("updated_at", ColumnType::Timestamp),
];

const VEHICLE_COLUMNS: &[Column] = &[
    col("id", ColumnType::Uuid),
    col("information", ColumnType::Text),
    col("organization_id", ColumnType::Uuid),
    col("created_at", ColumnType::Timestamp),
    col("updated_at", ColumnType::Timestamp),
];

const USAGE_COLUMNS: &[Column] = &[
    col("id", ColumnType::Uuid),
    col("vehicle_id", ColumnType::Uuid),
    col("date", ColumnType::Timestamp),
    col("usage_time", ColumnType::Integer),
    col("created_at", ColumnType::Timestamp),
    col("updated_at", ColumnType::Timestamp),
];

const PERFORMANCE_ASSESSMENT_COLUMNS: &[Column] = &[
    col("id", ColumnType::Uuid),
    col("vehicle_id", ColumnType::Uuid),
    col("assessment", ColumnType::Text),
    col("created_at", ColumnType::Timestamp),
    col("updated_at", ColumnType::Timestamp),
];

const RESERVATION_COLUMNS: &[Column] = &[
    col("id", ColumnType::Uuid),
    col("vehicle_id", ColumnType::Uuid),
    col("user_id", ColumnType::Uuid),
    col("start_time", ColumnType::Timestamp),
    col("end_time", ColumnType::Timestamp),
    col("created_at", ColumnType::Timestamp),
    col("updated_at", ColumnType::Timestamp),
];

const USER_COLUMNS: &[Column] = &[
    col("id", ColumnType::Uuid),
    col("email", ColumnType::Text),
    col("first_name", ColumnType::Text),
    col("last_name", ColumnType::Text),
    col("tenant_id", ColumnType::Text),
    col("created_at", ColumnType::Timestamp),
    col("updated_at", ColumnType::Timestamp),
];

const ORGANIZATION_RELATIONS: &[Relation] = &[has_many("vehicle", "organization_id", EntityKind::Vehicle)];

const VEHICLE_RELATIONS: &[Relation] = &[
    belongs_to("organization", "organization_id", EntityKind::Organization),
    has_many("performance_assessment", "vehicle_id", EntityKind::PerformanceAssessment),
    has_many("reservation", "vehicle_id", EntityKind::Reservation),
    has_many("usage", "vehicle_id", EntityKind::Usage),
];

const USAGE_RELATIONS: &[Relation] = &[belongs_to("vehicle", "vehicle_id", EntityKind::Vehicle)];

const PERFORMANCE_ASSESSMENT_RELATIONS: &[Relation] = &[belongs_to("vehicle", "vehicle_id", EntityKind::Vehicle)];

const RESERVATION_RELATIONS: &[Relation] = &[
    belongs_to("vehicle", "vehicle_id", EntityKind::Vehicle),
    belongs_to("user", "user_id", EntityKind::User),
];

const USER_RELATIONS: &[Relation] = &[has_many("reservation", "user_id", EntityKind::Reservation)];

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Organization,
        EntityKind::Vehicle,
        EntityKind::Usage,
        EntityKind::PerformanceAssessment,
        EntityKind::Reservation,
        EntityKind::User,
    ];

    /// Entity name; also the table name
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organization",
            EntityKind::Vehicle => "vehicle",
            EntityKind::Usage => "usage",
            EntityKind::PerformanceAssessment => "performance_assessment",
            EntityKind::Reservation => "reservation",
            EntityKind::User => "user",
        }
    }

    /// Plural path segment under `/api`
    pub fn route(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organizations",
            EntityKind::Vehicle => "vehicles",
            EntityKind::Usage => "usages",
            EntityKind::PerformanceAssessment => "performance-assessments",
            EntityKind::Reservation => "reservations",
            EntityKind::User => "users",
        }
    }

    pub fn from_route(route: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.route() == route)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            EntityKind::Organization => ORGANIZATION_COLUMNS,
            EntityKind::Vehicle => VEHICLE_COLUMNS,
            EntityKind::Usage => USAGE_COLUMNS,
            EntityKind::PerformanceAssessment => PERFORMANCE_ASSESSMENT_COLUMNS,
            EntityKind::Reservation => RESERVATION_COLUMNS,
            EntityKind::User => USER_COLUMNS,
        }
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns().iter().find(|c| c.name == name)
    }

    pub fn relations(&self) -> &'static [Relation] {
        match self {
            EntityKind::Organization => ORGANIZATION_RELATIONS,
            EntityKind::Vehicle => VEHICLE_RELATIONS,
            EntityKind::Usage => USAGE_RELATIONS,
            EntityKind::PerformanceAssessment => PERFORMANCE_ASSESSMENT_RELATIONS,
            EntityKind::Reservation => RESERVATION_RELATIONS,
            EntityKind::User => USER_RELATIONS,
        }
    }

    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations().iter().find(|r| r.name == name)
    }

    pub fn owner(&self) -> Owner {
        match self {
            EntityKind::Organization | EntityKind::User => Owner::Tenant,
            EntityKind::Vehicle => Owner::Parent { column: "organization_id", kind: EntityKind::Organization },
            EntityKind::Usage | EntityKind::PerformanceAssessment | EntityKind::Reservation => {
                Owner::Parent { column: "vehicle_id", kind: EntityKind::Vehicle }
            }
        }
    }

    /// Owner links from this entity up to the tenant-bearing entity, nearest first
    pub fn owner_chain(&self) -> Vec<(&'static str, EntityKind)> {
        let mut chain = Vec::new();
        let mut current = *self;
        while let Owner::Parent { column, kind } = current.owner() {
            chain.push((column, kind));
            current = kind;
        }
        chain
    }

    /// Entity at the end of the owner chain (the one carrying `tenant_id`)
    pub fn tenant_anchor(&self) -> EntityKind {
        self.owner_chain().last().map(|(_, kind)| *kind).unwrap_or(*self)
    }

    /// Re-encode a store row through this entity's row type.
    /// Fails when the row is missing a non-null column or carries a mistyped one.
    pub fn shape(&self, row: Value) -> Result<Value, serde_json::Error> {
        match self {
            EntityKind::Organization => reshape::<Organization>(row),
            EntityKind::Vehicle => reshape::<Vehicle>(row),
            EntityKind::Usage => reshape::<Usage>(row),
            EntityKind::PerformanceAssessment => reshape::<PerformanceAssessment>(row),
            EntityKind::Reservation => reshape::<Reservation>(row),
            EntityKind::User => reshape::<User>(row),
        }
    }
}

fn reshape<T: DeserializeOwned + Serialize>(row: Value) -> Result<Value, serde_json::Error> {
    let typed: T = serde_json::from_value(row)?;
    serde_json::to_value(typed)
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Allow-listed write payload: only the fields named here ever reach the store
pub trait WritePayload {
    /// Column writes for this payload. Required fields are always present;
    /// optional foreign keys only when the request body carried them.
    fn changes(&self) -> Changes;

    /// Non-null foreign keys the caller is trying to attach this record to
    fn references(&self) -> Vec<Reference>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub kind: EntityKind,
    pub id: Uuid,
}

/// Binds an entity kind to its typed row and its write payload.
/// Implemented by the row types so routes can be declared as `record::<Vehicle>`.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;
    type Payload: DeserializeOwned + Serialize + Validate + WritePayload + Send + Sync;
}

impl Entity for Organization {
    const KIND: EntityKind = EntityKind::Organization;
    type Payload = OrganizationPayload;
}

impl Entity for Vehicle {
    const KIND: EntityKind = EntityKind::Vehicle;
    type Payload = VehiclePayload;
}

impl Entity for Usage {
    const KIND: EntityKind = EntityKind::Usage;
    type Payload = UsagePayload;
}

impl Entity for PerformanceAssessment {
    const KIND: EntityKind = EntityKind::PerformanceAssessment;
    type Payload = PerformanceAssessmentPayload;
}

impl Entity for Reservation {
    const KIND: EntityKind = EntityKind::Reservation;
    type Payload = ReservationPayload;
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;
    type Payload = UserPayload;
}

/// Push a reference when an optional foreign key was set to a concrete id
pub(crate) fn push_reference(refs: &mut Vec<Reference>, field: &'static str, kind: EntityKind, value: &Option<Option<Uuid>>) {
    if let Some(Some(id)) = value {
        refs.push(Reference { field, kind, id: *id });
    }
}
