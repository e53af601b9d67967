//! Fleet assembly: turn [`FleetSettings`] into a complete autoscaling
//! template (IAM role and policy, instance profile, launch configuration,
//! autoscaling group, scaling policies and the CPU alarms that trigger them).
//!
//! Every field of [`FleetSettings`] has a default, so an empty settings table
//! produces a usable (if placeholder-filled) template.

use crate::error::SchemaError;
use crate::model::*;
use crate::pass1_build::{ParameterHandle, TemplateBuilder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const REGION_MAP: &str = "RegionMap";
pub const LAUNCH_CONFIG: &str = "myLaunchConfig";
pub const AUTOSCALING_GROUP: &str = "myAutoScalingGroup";

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetSettings {
    pub description: String,
    /// Row key of the region mapping.
    pub region: String,
    pub instance_type: String,
    pub allowed_instance_types: Vec<String>,
    pub ami_id: String,
    pub security_group_ids: Vec<String>,
    pub subnet_ids: Vec<String>,
    /// Empty means "every zone of the stack's region".
    pub availability_zones: Vec<String>,
    pub load_balancer_names: Vec<String>,
    /// yum packages installed by cfn-init.
    pub packages: Vec<String>,
    pub capacity: CapacitySettings,
    pub scaling: ScalingSettings,
    pub tags: Vec<TagSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapacitySettings {
    pub min: u32,
    pub max: u32,
    pub desired: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalingSettings {
    pub cooldown: u32,
    /// Instances added on scale-up and removed on scale-down.
    pub adjustment: u32,
    pub cpu_high: f64,
    pub cpu_low: f64,
    pub period: u32,
    pub evaluation_periods: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagSettings {
    pub key: String,
    pub value: String,
    #[serde(default = "default_propagate")]
    pub propagate_at_launch: bool,
}

fn default_propagate() -> bool {
    true
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for FleetSettings {
    fn default() -> Self {
        FleetSettings {
            description: "An EC2 instances with AutoScalling Group".to_owned(),
            region: "us-east-1".to_owned(),
            instance_type: "t2.micro".to_owned(),
            allowed_instance_types: strings(&[
                "t2.micro", "t2.small", "t2.medium", "m3.medium", "m3.large", "m3.xlarge",
                "m3.2xlarge", "c3.large", "c3.xlarge", "c3.2xlarge", "c3.4xlarge", "c3.8xlarge",
                "c4.large", "c4.xlarge", "c4.2xlarge", "c4.4xlarge", "c4.8xlarge", "r3.large",
                "r3.xlarge", "r3.2xlarge", "r3.4xlarge", "r3.8xlarge",
            ]),
            ami_id: "ami-xxxxxxxx".to_owned(),
            security_group_ids: strings(&["sg-xxxxxxxx"]),
            subnet_ids: strings(&["subnet-xxxxxxxx", "subnet-xxxxxxxx"]),
            availability_zones: strings(&["us-east-1a", "us-east-1b"]),
            load_balancer_names: strings(&["elb_name_here"]),
            packages: strings(&["git", "wget"]),
            capacity: CapacitySettings::default(),
            scaling: ScalingSettings::default(),
            tags: vec![
                TagSettings::new("Name", "MyInstance"),
                TagSettings::new("Project", "MyProject"),
                TagSettings::new("Team", "MyTeam"),
            ],
        }
    }
}

impl Default for CapacitySettings {
    fn default() -> Self {
        CapacitySettings {
            min: 1,
            max: 1,
            desired: 1,
        }
    }
}

impl Default for ScalingSettings {
    fn default() -> Self {
        ScalingSettings {
            cooldown: 300,
            adjustment: 1,
            cpu_high: 70.0,
            cpu_low: 20.0,
            period: 300,
            evaluation_periods: 2,
        }
    }
}

impl TagSettings {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        TagSettings {
            key: key.into(),
            value: value.into(),
            propagate_at_launch: true,
        }
    }
}

// ── Assembly ──────────────────────────────────────────────────────────────────

/// Build the fleet template. The result still has to go through
/// [`crate::validate`].
pub fn build_fleet_template(settings: &FleetSettings) -> Result<Template, SchemaError> {
    check_capacity(&settings.capacity)?;

    let mut b = TemplateBuilder::new();
    b.description(&settings.description);

    let params = add_parameters(&mut b, settings)?;

    let region_map = b.add_mapping(REGION_MAP, region_rows(settings))?;
    let region = || Value::pseudo(PseudoParameter::Region);

    let role = b.add_resource(
        Resource::new("IAMRole", ResourceKind::Role)
            .property("Path", "/")
            .property(
                "AssumeRolePolicyDocument",
                json!({
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Action": ["sts:AssumeRole"],
                        "Effect": "Allow",
                        "Principal": { "Service": ["ec2.amazonaws.com"] }
                    }]
                }),
            ),
    )?;

    b.add_resource(
        Resource::new("IAMPolicy", ResourceKind::PolicyType)
            .property("PolicyName", "bootstrap")
            .property("Roles", vec![role.reference()])
            .property(
                "PolicyDocument",
                json!({
                    "Version": "2012-10-17",
                    "Statement": [
                        {
                            "Action": ["ec2:DescribeTags", "ec2:CreateTags"],
                            "Resource": ["*"],
                            "Effect": "Allow"
                        },
                        {
                            "Action": ["route53:ListHostedZones", "route53:ChangeResourceRecordSets"],
                            "Resource": ["*"],
                            "Effect": "Allow"
                        }
                    ]
                }),
            ),
    )?;

    let profile = b.add_resource(
        Resource::new("IAMInstanceProfile", ResourceKind::InstanceProfile)
            .property("Path", "/")
            .property("Roles", vec![role.reference()]),
    )?;

    let launch_config = b.add_resource(
        Resource::new(LAUNCH_CONFIG, ResourceKind::LaunchConfiguration)
            .property("ImageId", region_map.find(region(), "AMIid"))
            .property("SecurityGroups", region_map.find(region(), "SGid"))
            .property("KeyName", params.key_name.reference())
            .property("InstanceType", params.instance_type.reference())
            .property("IamInstanceProfile", profile.reference())
            .property("UserData", bootstrap_user_data(LAUNCH_CONFIG))
            .metadata(cfn_init_metadata(&settings.packages)),
    )?;

    let zones = if settings.availability_zones.is_empty() {
        Value::get_azs("")
    } else {
        Value::from(settings.availability_zones.clone())
    };
    let mut group = Resource::new(AUTOSCALING_GROUP, ResourceKind::AutoScalingGroup)
        .property("DesiredCapacity", params.desired.reference())
        .property("MinSize", params.min.reference())
        .property("MaxSize", params.max.reference())
        .property("Cooldown", settings.scaling.cooldown.to_string());
    if !settings.load_balancer_names.is_empty() {
        group = group.property("LoadBalancerNames", region_map.find(region(), "ELBName"));
    }
    group = group
        .property("AvailabilityZones", zones)
        .property("LaunchConfigurationName", launch_config.reference())
        .property("VPCZoneIdentifier", region_map.find(region(), "SNETid"))
        .property("Tags", tags(&settings.tags));
    let group = b.add_resource(group)?;

    let adjustment = i64::from(settings.scaling.adjustment);
    let mut policies = Vec::new();
    for (name, delta) in [("myScalingUp", adjustment), ("myScalingDown", -adjustment)] {
        policies.push(b.add_resource(
            Resource::new(name, ResourceKind::ScalingPolicy)
                .property("AdjustmentType", "ChangeInCapacity")
                .property("ScalingAdjustment", delta.to_string())
                .property("Cooldown", settings.scaling.cooldown.to_string())
                .property("AutoScalingGroupName", group.reference()),
        )?);
    }

    let alarms = [
        ("CPUAlarmHigh", "GreaterThanThreshold", settings.scaling.cpu_high, "up"),
        ("CPUAlarmLow", "LessThanThreshold", settings.scaling.cpu_low, "down"),
    ];
    for ((name, operator, threshold, direction), policy) in alarms.into_iter().zip(&policies) {
        b.add_resource(
            Resource::new(name, ResourceKind::Alarm)
                .property(
                    "AlarmDescription",
                    format!("Scale {} on average CPU utilization", direction),
                )
                .property("ComparisonOperator", operator)
                .property(
                    "EvaluationPeriods",
                    settings.scaling.evaluation_periods.to_string(),
                )
                .property("MetricName", "CPUUtilization")
                .property("Namespace", "AWS/EC2")
                .property("Period", settings.scaling.period.to_string())
                .property("Statistic", "Average")
                .property("Threshold", threshold)
                .property("AlarmActions", vec![policy.reference()])
                .property(
                    "Dimensions",
                    vec![Value::map([
                        ("Name", Value::from("AutoScalingGroupName")),
                        ("Value", group.reference()),
                    ])],
                ),
        )?;
    }

    b.add_output(
        Output::new("AutoScalingGroupName", group.reference())
            .description("Name of the autoscaling group"),
    )?;
    b.add_output(
        Output::new("IAMRoleArn", role.get_att("Arn")).description("ARN of the instance role"),
    )?;

    Ok(b.build())
}

struct FleetParameters {
    key_name: ParameterHandle,
    instance_type: ParameterHandle,
    min: ParameterHandle,
    max: ParameterHandle,
    desired: ParameterHandle,
}

fn add_parameters(
    b: &mut TemplateBuilder,
    settings: &FleetSettings,
) -> Result<FleetParameters, SchemaError> {
    let key_name = b.add_parameter(
        Parameter::new("KeyName", ParameterType::String)
            .description("Name of an existing EC2 keypair"),
    )?;

    let mut instance_type = Parameter::new("InstanceType", ParameterType::String)
        .description("Choose instance type for EC2")
        .constraint_description("must be a valid EC2 instance type")
        .default_value(&settings.instance_type);
    if !settings.allowed_instance_types.is_empty() {
        instance_type = instance_type.allowed_values(settings.allowed_instance_types.clone());
    }
    let instance_type = b.add_parameter(instance_type)?;

    let c = &settings.capacity;
    let min = b.add_parameter(
        Parameter::new("MinNumInstances", ParameterType::Number)
            .description("Number of minimum instances")
            .constraint_description("Must be less than MaxNumInstances")
            .default_value(c.min.to_string()),
    )?;
    let max = b.add_parameter(
        Parameter::new("MaxNumInstances", ParameterType::Number)
            .description("Number of maximum instances")
            .constraint_description("Must be greater than MinNumInstances")
            .default_value(c.max.to_string()),
    )?;
    let desired = b.add_parameter(
        Parameter::new("DesNumInstances", ParameterType::Number)
            .description(
                "Number of instances that need to be running before creation is marked as complete.",
            )
            .constraint_description(
                "Must be in the range specified by MinNumInstances and MaxNumInstances.",
            )
            .default_value(c.desired.to_string()),
    )?;

    Ok(FleetParameters {
        key_name,
        instance_type,
        min,
        max,
        desired,
    })
}

fn check_capacity(c: &CapacitySettings) -> Result<(), SchemaError> {
    let invalid = |parameter: &str, message: String| SchemaError::InvalidParameter {
        parameter: parameter.to_owned(),
        field: "Default",
        message,
    };
    if c.min > c.max {
        return Err(invalid(
            "MinNumInstances",
            format!("{} is greater than MaxNumInstances {}", c.min, c.max),
        ));
    }
    if c.desired < c.min || c.desired > c.max {
        return Err(invalid(
            "DesNumInstances",
            format!("{} is outside {}..={}", c.desired, c.min, c.max),
        ));
    }
    Ok(())
}

fn region_rows(settings: &FleetSettings) -> MappingRows {
    let mut row: IndexMap<String, Value> = IndexMap::new();
    row.insert("AMIid".to_owned(), Value::from(&settings.ami_id));
    row.insert(
        "SGid".to_owned(),
        Value::from(settings.security_group_ids.clone()),
    );
    row.insert("SNETid".to_owned(), Value::from(settings.subnet_ids.clone()));
    if !settings.load_balancer_names.is_empty() {
        row.insert(
            "ELBName".to_owned(),
            Value::from(settings.load_balancer_names.clone()),
        );
    }
    let mut rows = MappingRows::new();
    rows.insert(settings.region.clone(), row);
    rows
}

fn tags(tags: &[TagSettings]) -> Value {
    Value::List(
        tags.iter()
            .map(|t| {
                Value::map([
                    ("Key", Value::from(&t.key)),
                    ("Value", Value::from(&t.value)),
                    ("PropagateAtLaunch", Value::from(t.propagate_at_launch)),
                ])
            })
            .collect(),
    )
}

/// Shell script run at first boot: refresh packages, then hand over to
/// cfn-init for the `InstallandRun` config set.
fn bootstrap_user_data(resource: &str) -> Value {
    Value::base64(Value::join(
        "",
        [
            Value::from("#!/bin/bash\n"),
            "yum clean all\n".into(),
            "yum update -y\n".into(),
            "yum install pystache python-daemon -y\n".into(),
            "/bin/rpm -U https://s3.amazonaws.com/cloudformation-examples/aws-cfn-bootstrap-latest.amzn1.noarch.rpm\n".into(),
            "/opt/aws/bin/cfn-init ".into(),
            "         --stack ".into(),
            Value::pseudo(PseudoParameter::StackName),
            format!("         --resource {}", resource).into(),
            "         --configsets InstallandRun".into(),
            "         --region ".into(),
            Value::pseudo(PseudoParameter::Region),
            "\n".into(),
        ],
    ))
}

fn cfn_init_metadata(packages: &[String]) -> Value {
    let yum = Value::Map(
        packages
            .iter()
            .map(|p| (p.clone(), Value::List(Vec::new())))
            .collect(),
    );
    let example_file = Value::map([
        (
            "content",
            Value::join(
                "",
                [
                    "This is a file example.\n",
                    "See another examples in:\n",
                    "https://github.com/rabeloo/cf-templates\n",
                ],
            ),
        ),
        ("owner", "root".into()),
        ("group", "root".into()),
        ("mode", "000600".into()),
    ]);
    Value::map([(
        "AWS::CloudFormation::Init",
        Value::map([
            (
                "configSets",
                Value::map([("InstallandRun", Value::from(vec!["install", "config"]))]),
            ),
            ("install", Value::map([("packages", Value::map([("yum", yum)]))])),
            (
                "config",
                Value::map([(
                    "files",
                    Value::map([("/tmp/example.txt", example_file)]),
                )]),
            ),
        ]),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass2_validate::validate;

    #[test]
    fn default_fleet_builds_and_validates() {
        let t = build_fleet_template(&FleetSettings::default()).unwrap();
        let names: Vec<&str> = t.resources.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "IAMRole",
                "IAMPolicy",
                "IAMInstanceProfile",
                LAUNCH_CONFIG,
                AUTOSCALING_GROUP,
                "myScalingUp",
                "myScalingDown",
                "CPUAlarmHigh",
                "CPUAlarmLow",
            ]
        );
        assert_eq!(t.parameters.len(), 5);
        assert!(validate(t).is_ok());
    }

    #[test]
    fn every_kind_is_used() {
        let t = build_fleet_template(&FleetSettings::default()).unwrap();
        for kind in ResourceKind::ALL {
            assert!(
                t.resources.values().any(|r| r.kind == kind),
                "{} not used",
                kind.name()
            );
        }
    }

    #[test]
    fn empty_zone_list_falls_back_to_get_azs() {
        let settings = FleetSettings {
            availability_zones: Vec::new(),
            ..FleetSettings::default()
        };
        let t = build_fleet_template(&settings).unwrap();
        assert_eq!(
            t.resources[AUTOSCALING_GROUP].properties["AvailabilityZones"],
            Value::get_azs("")
        );
    }

    #[test]
    fn no_load_balancers_drops_the_column_and_property() {
        let settings = FleetSettings {
            load_balancer_names: Vec::new(),
            ..FleetSettings::default()
        };
        let t = build_fleet_template(&settings).unwrap();
        assert!(!t.mappings[REGION_MAP].has_column("ELBName"));
        assert!(!t.resources[AUTOSCALING_GROUP]
            .properties
            .contains_key("LoadBalancerNames"));
        assert!(validate(t).is_ok());
    }

    #[test]
    fn desired_capacity_outside_range_is_rejected() {
        let settings = FleetSettings {
            capacity: CapacitySettings {
                min: 2,
                max: 4,
                desired: 5,
            },
            ..FleetSettings::default()
        };
        let err = build_fleet_template(&settings).unwrap_err();
        assert!(err.to_string().contains("DesNumInstances"));
    }

    #[test]
    fn instance_type_outside_allowed_list_fails_validation() {
        let settings = FleetSettings {
            instance_type: "x1.huge".to_owned(),
            ..FleetSettings::default()
        };
        let errors = validate(build_fleet_template(&settings).unwrap()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].subject(), "InstanceType");
    }

    #[test]
    fn scale_down_uses_negative_adjustment() {
        let t = build_fleet_template(&FleetSettings::default()).unwrap();
        assert_eq!(
            t.resources["myScalingDown"].properties["ScalingAdjustment"],
            Value::from("-1")
        );
    }
}
