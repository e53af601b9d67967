//! Template data model.
//!
//! These types are produced by the builder and consumed by the validator and
//! serializer. They live here so each stage can import them without
//! depending on the others.

use indexmap::IndexMap;

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

/// A property value: a JSON-like literal or an intrinsic function call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Intrinsic(Box<Intrinsic>),
}

/// An intrinsic function, resolved by the provisioning engine at deploy time.
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic {
    /// `Ref` to a declared parameter.
    ParameterRef(String),
    /// `Ref` to a declared resource.
    ResourceRef(String),
    /// `Ref` to a provider-supplied pseudo parameter.
    Pseudo(PseudoParameter),
    /// `Fn::FindInMap`. The top key is usually a literal or `AWS::Region`.
    FindInMap {
        mapping: String,
        top_key: Value,
        column: String,
    },
    /// `Fn::GetAtt`.
    GetAtt { resource: String, attribute: String },
    /// `Fn::GetAZs`. An empty region means the stack's own region.
    GetAZs(String),
    /// `Fn::Join`.
    Join { delimiter: String, parts: Vec<Value> },
    /// `Fn::Base64`.
    Base64(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoParameter {
    Region,
    StackName,
    StackId,
    AccountId,
    NoValue,
    NotificationArns,
}

impl PseudoParameter {
    pub const ALL: [PseudoParameter; 6] = [
        PseudoParameter::Region,
        PseudoParameter::StackName,
        PseudoParameter::StackId,
        PseudoParameter::AccountId,
        PseudoParameter::NoValue,
        PseudoParameter::NotificationArns,
    ];

    /// Looks up a pseudo parameter by its `AWS::` name.
    pub fn from_name(name: &str) -> Option<PseudoParameter> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            PseudoParameter::Region => "AWS::Region",
            PseudoParameter::StackName => "AWS::StackName",
            PseudoParameter::StackId => "AWS::StackId",
            PseudoParameter::AccountId => "AWS::AccountId",
            PseudoParameter::NoValue => "AWS::NoValue",
            PseudoParameter::NotificationArns => "AWS::NotificationARNs",
        }
    }
}

impl Value {
    pub fn parameter_ref(name: impl Into<String>) -> Value {
        Intrinsic::ParameterRef(name.into()).into()
    }

    /// A reference by name, usable before the target resource is added.
    pub fn resource_ref(name: impl Into<String>) -> Value {
        Intrinsic::ResourceRef(name.into()).into()
    }

    pub fn pseudo(p: PseudoParameter) -> Value {
        Intrinsic::Pseudo(p).into()
    }

    pub fn find_in_map(
        mapping: impl Into<String>,
        top_key: impl Into<Value>,
        column: impl Into<String>,
    ) -> Value {
        Intrinsic::FindInMap {
            mapping: mapping.into(),
            top_key: top_key.into(),
            column: column.into(),
        }
        .into()
    }

    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Value {
        Intrinsic::GetAtt {
            resource: resource.into(),
            attribute: attribute.into(),
        }
        .into()
    }

    pub fn get_azs(region: impl Into<String>) -> Value {
        Intrinsic::GetAZs(region.into()).into()
    }

    pub fn join<I, V>(delimiter: impl Into<String>, parts: I) -> Value
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Intrinsic::Join {
            delimiter: delimiter.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
        .into()
    }

    pub fn base64(value: impl Into<Value>) -> Value {
        Intrinsic::Base64(value.into()).into()
    }

    /// Builds a map value from key/value pairs, keeping their order.
    pub fn map<I, K, V>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Intrinsic> for Value {
    fn from(i: Intrinsic) -> Self {
        Value::Intrinsic(Box::new(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::UInt(n),
        }
    }
}

/// Keys that mark a single-key JSON object as an intrinsic call.
pub const INTRINSIC_FUNCTIONS: [&str; 6] = [
    "Ref",
    "Fn::FindInMap",
    "Fn::GetAtt",
    "Fn::GetAZs",
    "Fn::Join",
    "Fn::Base64",
];

/// True for a key the provisioning engine would read as a function call.
pub fn is_intrinsic_key(key: &str) -> bool {
    key == "Ref" || key.starts_with("Fn::")
}

/// Converts literal JSON, recognising intrinsic calls written in their
/// native syntax (`{"Ref": "KeyName"}`). A `Ref` to an `AWS::` name becomes
/// [`Intrinsic::Pseudo`]; any other `Ref` resolves later against both
/// parameters and resources. Calls with an unexpected argument shape stay
/// maps and are rejected by the validator.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((key, arg)), None) if INTRINSIC_FUNCTIONS.contains(&key.as_str()) => {
                        match intrinsic_from_json(&key, arg) {
                            Ok(intrinsic) => intrinsic.into(),
                            Err(arg) => Value::map([(key, Value::from(arg))]),
                        }
                    }
                    (first, second) => Value::Map(
                        first
                            .into_iter()
                            .chain(second)
                            .chain(entries)
                            .map(|(k, v)| (k, Value::from(v)))
                            .collect(),
                    ),
                }
            }
        }
    }
}

/// Hands the argument back when its shape does not fit `function`.
fn intrinsic_from_json(
    function: &str,
    arg: serde_json::Value,
) -> Result<Intrinsic, serde_json::Value> {
    use serde_json::Value as Json;

    match (function, arg) {
        ("Ref", Json::String(name)) => Ok(match PseudoParameter::from_name(&name) {
            Some(p) => Intrinsic::Pseudo(p),
            None => Intrinsic::ResourceRef(name),
        }),
        ("Fn::GetAtt", Json::String(path)) => match path.split_once('.') {
            Some((resource, attribute)) => Ok(Intrinsic::GetAtt {
                resource: resource.to_owned(),
                attribute: attribute.to_owned(),
            }),
            None => Err(Json::String(path)),
        },
        ("Fn::GetAtt", Json::Array(items)) => match <[Json; 2]>::try_from(items) {
            Ok([Json::String(resource), Json::String(attribute)]) => {
                Ok(Intrinsic::GetAtt { resource, attribute })
            }
            Ok(items) => Err(Json::Array(Vec::from(items))),
            Err(items) => Err(Json::Array(items)),
        },
        ("Fn::FindInMap", Json::Array(items)) => match <[Json; 3]>::try_from(items) {
            Ok([Json::String(mapping), top_key, Json::String(column)]) => {
                Ok(Intrinsic::FindInMap {
                    mapping,
                    top_key: Value::from(top_key),
                    column,
                })
            }
            Ok(items) => Err(Json::Array(Vec::from(items))),
            Err(items) => Err(Json::Array(items)),
        },
        ("Fn::GetAZs", Json::String(region)) => Ok(Intrinsic::GetAZs(region)),
        ("Fn::Join", Json::Array(items)) => match <[Json; 2]>::try_from(items) {
            Ok([Json::String(delimiter), Json::Array(parts)]) => Ok(Intrinsic::Join {
                delimiter,
                parts: parts.into_iter().map(Value::from).collect(),
            }),
            Ok(items) => Err(Json::Array(Vec::from(items))),
            Err(items) => Err(Json::Array(items)),
        },
        ("Fn::Base64", arg) => Ok(Intrinsic::Base64(Value::from(arg))),
        (_, arg) => Err(arg),
    }
}

// ──────────────────────────────────────────────
// Parameters and mappings
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Number,
}

impl ParameterType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterType::String => "String",
            ParameterType::Number => "Number",
        }
    }
}

impl std::str::FromStr for ParameterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(ParameterType::String),
            "Number" => Ok(ParameterType::Number),
            other => Err(format!("unknown parameter type '{}'", other)),
        }
    }
}

/// A template input, supplied by whoever creates the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub logical_name: String,
    pub type_: ParameterType,
    pub default: Option<String>,
    pub description: Option<String>,
    pub allowed_values: Option<Vec<String>>,
    pub constraint_description: Option<String>,
}

impl Parameter {
    pub fn new(logical_name: impl Into<String>, type_: ParameterType) -> Self {
        Parameter {
            logical_name: logical_name.into(),
            type_,
            default: None,
            description: None,
            allowed_values: None,
            constraint_description: None,
        }
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn constraint_description(mut self, text: impl Into<String>) -> Self {
        self.constraint_description = Some(text.into());
        self
    }
}

/// Rows keyed by top-level key (usually a region), each a column map.
pub type MappingRows = IndexMap<String, IndexMap<String, Value>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub name: String,
    pub rows: MappingRows,
}

impl Mapping {
    /// Column names of the first row. The builder guarantees all rows agree.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.rows
            .values()
            .next()
            .into_iter()
            .flat_map(|row| row.keys().map(String::as_str))
    }

    pub fn has_column(&self, column: &str) -> bool {
        !self.rows.is_empty() && self.rows.values().all(|row| row.contains_key(column))
    }
}

// ──────────────────────────────────────────────
// Resources
// ──────────────────────────────────────────────

/// The resource kinds this crate knows how to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Role,
    PolicyType,
    InstanceProfile,
    LaunchConfiguration,
    AutoScalingGroup,
    ScalingPolicy,
    Alarm,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Role,
        ResourceKind::PolicyType,
        ResourceKind::InstanceProfile,
        ResourceKind::LaunchConfiguration,
        ResourceKind::AutoScalingGroup,
        ResourceKind::ScalingPolicy,
        ResourceKind::Alarm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Role => "Role",
            ResourceKind::PolicyType => "PolicyType",
            ResourceKind::InstanceProfile => "InstanceProfile",
            ResourceKind::LaunchConfiguration => "LaunchConfiguration",
            ResourceKind::AutoScalingGroup => "AutoScalingGroup",
            ResourceKind::ScalingPolicy => "ScalingPolicy",
            ResourceKind::Alarm => "Alarm",
        }
    }

    /// The provider's type string, emitted as the resource's `Type`.
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Role => "AWS::IAM::Role",
            ResourceKind::PolicyType => "AWS::IAM::Policy",
            ResourceKind::InstanceProfile => "AWS::IAM::InstanceProfile",
            ResourceKind::LaunchConfiguration => "AWS::AutoScaling::LaunchConfiguration",
            ResourceKind::AutoScalingGroup => "AWS::AutoScaling::AutoScalingGroup",
            ResourceKind::ScalingPolicy => "AWS::AutoScaling::ScalingPolicy",
            ResourceKind::Alarm => "AWS::CloudWatch::Alarm",
        }
    }

    pub fn required_properties(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Role => &["Path", "AssumeRolePolicyDocument"],
            ResourceKind::PolicyType => &["PolicyName", "Roles", "PolicyDocument"],
            ResourceKind::InstanceProfile => &["Path", "Roles"],
            ResourceKind::LaunchConfiguration => &["ImageId", "InstanceType"],
            ResourceKind::AutoScalingGroup => &[
                "MinSize",
                "MaxSize",
                "DesiredCapacity",
                "LaunchConfigurationName",
            ],
            ResourceKind::ScalingPolicy => {
                &["AdjustmentType", "ScalingAdjustment", "AutoScalingGroupName"]
            }
            ResourceKind::Alarm => &[
                "ComparisonOperator",
                "EvaluationPeriods",
                "MetricName",
                "Namespace",
                "Period",
                "Statistic",
                "Threshold",
            ],
        }
    }

    /// Properties whose literal string values must come from a fixed set.
    pub fn enumerated_properties(self) -> &'static [(&'static str, &'static [&'static str])] {
        match self {
            ResourceKind::ScalingPolicy => &[(
                "AdjustmentType",
                &["ChangeInCapacity", "ExactCapacity", "PercentChangeInCapacity"],
            )],
            ResourceKind::Alarm => &[
                (
                    "ComparisonOperator",
                    &[
                        "GreaterThanOrEqualToThreshold",
                        "GreaterThanThreshold",
                        "LessThanThreshold",
                        "LessThanOrEqualToThreshold",
                    ],
                ),
                (
                    "Statistic",
                    &["SampleCount", "Average", "Sum", "Minimum", "Maximum"],
                ),
            ],
            _ => &[],
        }
    }

    /// Attributes readable through `Fn::GetAtt`.
    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Role => &["Arn", "RoleId"],
            ResourceKind::InstanceProfile => &["Arn"],
            ResourceKind::ScalingPolicy => &["Arn"],
            ResourceKind::Alarm => &["Arn"],
            ResourceKind::PolicyType
            | ResourceKind::LaunchConfiguration
            | ResourceKind::AutoScalingGroup => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub logical_name: String,
    pub kind: ResourceKind,
    pub properties: IndexMap<String, Value>,
    /// Explicit ordering edges on top of the ones implied by references.
    pub depends_on: Vec<String>,
    pub metadata: Option<Value>,
}

impl Resource {
    pub fn new(logical_name: impl Into<String>, kind: ResourceKind) -> Self {
        Resource {
            logical_name: logical_name.into(),
            kind,
            properties: IndexMap::new(),
            depends_on: Vec::new(),
            metadata: None,
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn depends_on(mut self, logical_name: impl Into<String>) -> Self {
        self.depends_on.push(logical_name.into());
        self
    }

    pub fn metadata(mut self, metadata: impl Into<Value>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

// ──────────────────────────────────────────────
// Outputs and the template itself
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub logical_name: String,
    pub description: Option<String>,
    pub value: Value,
    pub export_name: Option<Value>,
}

impl Output {
    pub fn new(logical_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Output {
            logical_name: logical_name.into(),
            description: None,
            value: value.into(),
            export_name: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn export_name(mut self, name: impl Into<Value>) -> Self {
        self.export_name = Some(name.into());
        self
    }
}

/// A fully constructed, not yet validated, document.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub format_version: String,
    pub description: Option<String>,
    pub parameters: IndexMap<String, Parameter>,
    pub mappings: IndexMap<String, Mapping>,
    pub resources: IndexMap<String, Resource>,
    pub outputs: IndexMap<String, Output>,
}
