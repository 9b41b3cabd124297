//! Per-API request builders and response parsers.
//!
//! Each admin API is a fixed pair of pure functions carried on a static
//! adapter record: the builder encodes the request at the highest protocol
//! version the destination broker supports, the parser decodes the reply
//! and places per-element results at the positions of the matching inputs,
//! so applications always see results in submission order regardless of how
//! the broker ordered them.

use weir_admin_core::{
    AdminError, ConfigEntry, ConfigResource, ConfigResourceResult, ConfigSource, ErrorCode,
    ResourceType, TopicResult,
};

use crate::api::AdminOp;
use crate::cluster::{ApiKey, BrokerRef, ReplyFrame, WireRequest};
use crate::request::AdminRequest;
use crate::wire::{WireReader, WireWriter};

/// Per-element results of a completed request, not yet wrapped into the
/// API-tagged result event.
#[derive(Debug)]
pub(crate) enum ResultPayload {
    Topics(Vec<TopicResult>),
    Configs(Vec<ConfigResourceResult>),
}

impl ResultPayload {
    /// The empty payload of `op`'s shape, used for failure results.
    pub(crate) fn empty_for(op: AdminOp) -> Self {
        match op {
            AdminOp::CreateTopics | AdminOp::DeleteTopics | AdminOp::CreatePartitions => {
                ResultPayload::Topics(Vec::new())
            }
            AdminOp::AlterConfigs | AdminOp::DescribeConfigs => ResultPayload::Configs(Vec::new()),
        }
    }
}

/// The builder/parser pair implementing one admin API.
pub(crate) struct ApiAdapter {
    pub(crate) build: fn(&AdminRequest, &BrokerRef) -> Result<WireRequest, AdminError>,
    pub(crate) parse: fn(&AdminRequest, &mut ReplyFrame) -> Result<ResultPayload, String>,
}

static CREATE_TOPICS: ApiAdapter = ApiAdapter {
    build: build_create_topics,
    parse: parse_create_topics,
};
static DELETE_TOPICS: ApiAdapter = ApiAdapter {
    build: build_delete_topics,
    parse: parse_delete_topics,
};
static CREATE_PARTITIONS: ApiAdapter = ApiAdapter {
    build: build_create_partitions,
    parse: parse_create_partitions,
};
static ALTER_CONFIGS: ApiAdapter = ApiAdapter {
    build: build_alter_configs,
    parse: parse_alter_configs,
};
static DESCRIBE_CONFIGS: ApiAdapter = ApiAdapter {
    build: build_describe_configs,
    parse: parse_describe_configs,
};

/// The adapter implementing `op`.
pub(crate) fn adapter_for(op: AdminOp) -> &'static ApiAdapter {
    match op {
        AdminOp::CreateTopics => &CREATE_TOPICS,
        AdminOp::DeleteTopics => &DELETE_TOPICS,
        AdminOp::CreatePartitions => &CREATE_PARTITIONS,
        AdminOp::AlterConfigs => &ALTER_CONFIGS,
        AdminOp::DescribeConfigs => &DESCRIBE_CONFIGS,
    }
}

fn negotiate(
    broker: &BrokerRef,
    key: ApiKey,
    min: i16,
    max: i16,
    feature: &str,
) -> Result<i16, AdminError> {
    broker.negotiate(key, min, max).ok_or_else(|| {
        AdminError::UnsupportedFeature(format!(
            "{feature} not supported by broker {}",
            broker.id()
        ))
    })
}

const TOPIC_ADMIN_FEATURE: &str = "Topic Admin API (KIP-4)";
const CONFIG_ADMIN_FEATURE: &str = "Config Admin API (KIP-133)";

fn build_create_topics(req: &AdminRequest, broker: &BrokerRef) -> Result<WireRequest, AdminError> {
    let api_version = negotiate(broker, ApiKey::CreateTopics, 0, 2, TOPIC_ADMIN_FEATURE)?;
    let topics = req.args.new_topics();

    let mut w = WireWriter::new();
    w.put_array_len(topics.len());
    for topic in topics {
        w.put_str(topic.name());
        w.put_i32(topic.num_partitions());
        w.put_i16(topic.replication_factor() as i16);

        w.put_array_len(topic.replica_assignment().len());
        for (partition, broker_ids) in topic.replica_assignment().iter().enumerate() {
            w.put_i32(partition as i32);
            w.put_array_len(broker_ids.len());
            for id in broker_ids {
                w.put_i32(*id);
            }
        }

        w.put_array_len(topic.config().len());
        for (name, value) in topic.config() {
            w.put_str(name);
            w.put_nullable_str(Some(value));
        }
    }
    w.put_i32(req.options.operation_timeout_ms());
    if api_version >= 1 {
        w.put_bool(req.options.validate_only());
    }

    Ok(WireRequest {
        api_key: ApiKey::CreateTopics,
        api_version,
        body: w.finish(),
    })
}

fn build_delete_topics(req: &AdminRequest, broker: &BrokerRef) -> Result<WireRequest, AdminError> {
    let api_version = negotiate(broker, ApiKey::DeleteTopics, 0, 1, TOPIC_ADMIN_FEATURE)?;
    let topics = req.args.topic_names();

    let mut w = WireWriter::new();
    w.put_array_len(topics.len());
    for topic in topics {
        w.put_str(topic);
    }
    w.put_i32(req.options.operation_timeout_ms());

    Ok(WireRequest {
        api_key: ApiKey::DeleteTopics,
        api_version,
        body: w.finish(),
    })
}

fn build_create_partitions(
    req: &AdminRequest,
    broker: &BrokerRef,
) -> Result<WireRequest, AdminError> {
    let api_version = negotiate(broker, ApiKey::CreatePartitions, 0, 0, TOPIC_ADMIN_FEATURE)?;
    let partitions = req.args.new_partitions();

    let mut w = WireWriter::new();
    w.put_array_len(partitions.len());
    for spec in partitions {
        w.put_str(spec.topic());
        w.put_i32(spec.total_count());
        if spec.replica_assignment().is_empty() {
            w.put_null_array();
        } else {
            w.put_array_len(spec.replica_assignment().len());
            for broker_ids in spec.replica_assignment() {
                w.put_array_len(broker_ids.len());
                for id in broker_ids {
                    w.put_i32(*id);
                }
            }
        }
    }
    w.put_i32(req.options.operation_timeout_ms());
    w.put_bool(req.options.validate_only());

    Ok(WireRequest {
        api_key: ApiKey::CreatePartitions,
        api_version,
        body: w.finish(),
    })
}

fn build_alter_configs(req: &AdminRequest, broker: &BrokerRef) -> Result<WireRequest, AdminError> {
    if req.options.incremental() {
        return Err(AdminError::UnsupportedFeature(
            "incremental AlterConfigs requires broker version >= 2.3.0 \
             and is not supported by this client"
                .into(),
        ));
    }

    let api_version = negotiate(broker, ApiKey::AlterConfigs, 0, 0, CONFIG_ADMIN_FEATURE)?;
    let resources = req.args.config_resources();

    let mut w = WireWriter::new();
    w.put_array_len(resources.len());
    for resource in resources {
        w.put_i8(resource.resource_type().tag());
        w.put_str(resource.name());
        w.put_array_len(resource.entries().len());
        for entry in resource.entries() {
            w.put_str(&entry.name);
            w.put_nullable_str(entry.value.as_deref());
        }
    }
    w.put_bool(req.options.validate_only());

    Ok(WireRequest {
        api_key: ApiKey::AlterConfigs,
        api_version,
        body: w.finish(),
    })
}

fn build_describe_configs(
    req: &AdminRequest,
    broker: &BrokerRef,
) -> Result<WireRequest, AdminError> {
    let api_version = negotiate(broker, ApiKey::DescribeConfigs, 0, 1, CONFIG_ADMIN_FEATURE)?;
    let resources = req.args.config_resources();

    let mut w = WireWriter::new();
    w.put_array_len(resources.len());
    for resource in resources {
        w.put_i8(resource.resource_type().tag());
        w.put_str(resource.name());
        // Entry names act as a property filter; an empty set asks for all
        // properties, encoded as a null array.
        if resource.entries().is_empty() {
            w.put_null_array();
        } else {
            w.put_array_len(resource.entries().len());
            for entry in resource.entries() {
                w.put_str(&entry.name);
            }
        }
    }
    if api_version >= 1 {
        w.put_bool(true); // include_synonyms
    }

    Ok(WireRequest {
        api_key: ApiKey::DescribeConfigs,
        api_version,
        body: w.finish(),
    })
}

/// Shared decode of the `[topic, error_code, (error_message)]` result array
/// of the three topic-mutation APIs, reordered to the submission order.
fn parse_topic_results(
    r: &mut WireReader,
    names: &[&str],
    operation_timeout_ms: i32,
    has_error_message: bool,
) -> Result<Vec<TopicResult>, String> {
    let topic_cnt = r.read_array_len("topic results")?;
    if topic_cnt as usize > names.len() {
        return Err(format!(
            "received {topic_cnt} topics in response when only {} were requested",
            names.len()
        ));
    }

    let mut slots: Vec<Option<TopicResult>> = names.iter().map(|_| None).collect();
    for _ in 0..topic_cnt {
        let topic = r.read_str("topic name")?;
        let mut error = ErrorCode::from_code(r.read_i16("error code")?);
        let mut message = if has_error_message {
            r.read_nullable_str("error message")?.filter(|m| !m.is_empty())
        } else {
            None
        };

        // In non-blocking mode the broker reports REQUEST_TIMED_OUT for
        // mutations it has accepted but not finished applying; hide it from
        // the application.
        if error == ErrorCode::RequestTimedOut && operation_timeout_ms <= 0 {
            error = ErrorCode::None;
            message = None;
        }

        let error_message = error
            .is_error()
            .then(|| message.unwrap_or_else(|| error.describe().to_string()));

        let pos = names.iter().position(|n| *n == topic).ok_or_else(|| {
            format!("broker returned topic {topic} that was not included in the original request")
        })?;
        if slots[pos].is_some() {
            return Err(format!("broker returned topic {topic} multiple times"));
        }
        slots[pos] = Some(TopicResult {
            topic,
            error,
            error_message,
        });
    }

    Ok(slots.into_iter().flatten().collect())
}

fn parse_create_topics(req: &AdminRequest, reply: &mut ReplyFrame) -> Result<ResultPayload, String> {
    let mut r = WireReader::new(reply.body.clone());
    if reply.api_version >= 2 {
        reply.throttle_ms = Some(r.read_i32("throttle_time")?);
    }
    let names: Vec<&str> = req.args.new_topics().iter().map(|t| t.name()).collect();
    let topics = parse_topic_results(
        &mut r,
        &names,
        req.options.operation_timeout_ms(),
        reply.api_version >= 1,
    )?;
    Ok(ResultPayload::Topics(topics))
}

fn parse_delete_topics(req: &AdminRequest, reply: &mut ReplyFrame) -> Result<ResultPayload, String> {
    let mut r = WireReader::new(reply.body.clone());
    if reply.api_version >= 1 {
        reply.throttle_ms = Some(r.read_i32("throttle_time")?);
    }
    let names: Vec<&str> = req.args.topic_names().iter().map(|t| t.as_str()).collect();
    let topics = parse_topic_results(&mut r, &names, req.options.operation_timeout_ms(), false)?;
    Ok(ResultPayload::Topics(topics))
}

fn parse_create_partitions(
    req: &AdminRequest,
    reply: &mut ReplyFrame,
) -> Result<ResultPayload, String> {
    let mut r = WireReader::new(reply.body.clone());
    reply.throttle_ms = Some(r.read_i32("throttle_time")?);
    let names: Vec<&str> = req.args.new_partitions().iter().map(|p| p.topic()).collect();
    let topics = parse_topic_results(&mut r, &names, req.options.operation_timeout_ms(), true)?;
    Ok(ResultPayload::Topics(topics))
}

/// Place `result` at the position its (type, name) key had in the request.
fn place_config_result(
    requested: &[ConfigResource],
    slots: &mut [Option<ConfigResourceResult>],
    result: ConfigResourceResult,
) -> Result<(), String> {
    let pos = requested
        .iter()
        .position(|c| c.resource_type() == result.resource_type && c.name() == result.name)
        .ok_or_else(|| {
            format!(
                "broker returned ConfigResource {},{} that was not included in the original request",
                result.resource_type.name(),
                result.name
            )
        })?;
    if slots[pos].is_some() {
        return Err(format!(
            "broker returned ConfigResource {},{} multiple times",
            result.resource_type.name(),
            result.name
        ));
    }
    slots[pos] = Some(result);
    Ok(())
}

fn parse_alter_configs(req: &AdminRequest, reply: &mut ReplyFrame) -> Result<ResultPayload, String> {
    let mut r = WireReader::new(reply.body.clone());
    reply.throttle_ms = Some(r.read_i32("throttle_time")?);

    let resources = req.args.config_resources();
    let res_cnt = r.read_array_len("config resources")?;
    if res_cnt as usize > resources.len() {
        return Err(format!(
            "received {res_cnt} ConfigResources in response when only {} were requested",
            resources.len()
        ));
    }

    let mut slots: Vec<Option<ConfigResourceResult>> = resources.iter().map(|_| None).collect();
    for i in 0..res_cnt {
        let error = ErrorCode::from_code(r.read_i16("error code")?);
        let message = r.read_nullable_str("error message")?.filter(|m| !m.is_empty());
        let type_tag = r.read_i8("resource type")?;
        let name = r.read_str("resource name")?;

        let Some(resource_type) = ResourceType::from_tag(type_tag) else {
            tracing::warn!(
                index = i,
                type_tag,
                name = %name,
                "AlterConfigs returned unsupported config resource, ignoring"
            );
            continue;
        };

        let error_message = error
            .is_error()
            .then(|| message.unwrap_or_else(|| error.describe().to_string()));
        place_config_result(
            resources,
            &mut slots,
            ConfigResourceResult {
                resource_type,
                name,
                error,
                error_message,
                entries: Vec::new(),
            },
        )?;
    }

    Ok(ResultPayload::Configs(slots.into_iter().flatten().collect()))
}

fn parse_config_entry(
    r: &mut WireReader,
    api_version: i16,
    resource_name: &str,
) -> Result<ConfigEntry, String> {
    let name = r.read_str("config name")?;
    let value = r.read_nullable_str("config value")?;
    let is_read_only = r.read_bool("is_read_only")?;

    // Version 0 carries an is_default flag where version 1 carries a source
    // tag; fill both fields consistently whichever shape arrived.
    let (source, is_default) = if api_version == 0 {
        let is_default = r.read_bool("is_default")?;
        let source = if is_default {
            ConfigSource::Default
        } else {
            ConfigSource::Unknown
        };
        (source, is_default)
    } else {
        let source = ConfigSource::from_tag(r.read_i8("config source")?);
        (source, source == ConfigSource::Default)
    };

    let is_sensitive = r.read_bool("is_sensitive")?;

    let mut synonyms = Vec::new();
    if api_version >= 1 {
        let syn_cnt = r.read_array_len("config synonyms")?;
        if syn_cnt > 100_000 {
            return Err(format!(
                "broker returned {syn_cnt} config synonyms for \"{resource_name}\": \
                 limit is 100000"
            ));
        }
        for _ in 0..syn_cnt {
            let syn_name = r.read_str("synonym name")?;
            let syn_value = r.read_nullable_str("synonym value")?;
            let syn_source = ConfigSource::from_tag(r.read_i8("synonym source")?);
            synonyms.push(ConfigEntry {
                name: syn_name,
                value: syn_value,
                source: syn_source,
                is_read_only: false,
                is_default: false,
                is_sensitive: false,
                is_synonym: true,
                synonyms: Vec::new(),
            });
        }
    }

    Ok(ConfigEntry {
        name,
        value,
        source,
        is_read_only,
        is_default,
        is_sensitive,
        is_synonym: false,
        synonyms,
    })
}

fn parse_describe_configs(
    req: &AdminRequest,
    reply: &mut ReplyFrame,
) -> Result<ResultPayload, String> {
    let mut r = WireReader::new(reply.body.clone());
    reply.throttle_ms = Some(r.read_i32("throttle_time")?);

    let resources = req.args.config_resources();
    let res_cnt = r.read_array_len("config resources")?;
    if res_cnt as usize > resources.len() {
        return Err(format!(
            "received {res_cnt} ConfigResources in response when only {} were requested",
            resources.len()
        ));
    }

    let mut slots: Vec<Option<ConfigResourceResult>> = resources.iter().map(|_| None).collect();
    for i in 0..res_cnt {
        let error = ErrorCode::from_code(r.read_i16("error code")?);
        let message = r.read_nullable_str("error message")?.filter(|m| !m.is_empty());
        let type_tag = r.read_i8("resource type")?;
        let name = r.read_str("resource name")?;

        let entry_cnt = r.read_array_len("config entries")?;
        let mut entries = Vec::new();
        for _ in 0..entry_cnt {
            entries.push(parse_config_entry(&mut r, reply.api_version, &name)?);
        }

        // Checked after the entries so the reader stays aligned for the
        // next resource even when this one is skipped.
        let Some(resource_type) = ResourceType::from_tag(type_tag) else {
            tracing::warn!(
                index = i,
                type_tag,
                name = %name,
                "DescribeConfigs returned unsupported config resource, ignoring"
            );
            continue;
        };

        let error_message = error
            .is_error()
            .then(|| message.unwrap_or_else(|| error.describe().to_string()));
        place_config_result(
            resources,
            &mut slots,
            ConfigResourceResult {
                resource_type,
                name,
                error,
                error_message,
                entries,
            },
        )?;
    }

    Ok(ResultPayload::Configs(slots.into_iter().flatten().collect()))
}
