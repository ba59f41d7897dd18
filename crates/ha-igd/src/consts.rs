//! Constants for the IGD integration

pub const DOMAIN: &str = "igd";

/// Config entry data keys
pub const CONF_UDN: &str = "udn";
pub const CONF_SSDP_DESCRIPTION: &str = "ssdp_description";
pub const CONF_ENABLE_SENSORS: &str = "enable_sensors";
pub const CONF_ENABLE_PORT_MAPPING: &str = "enable_port_mapping";

/// Discovery info keys
pub const DISCOVERY_HOST: &str = "host";
pub const DISCOVERY_NAME: &str = "name";

/// Selection form fields, also the import request keys
pub const FIELD_NAME: &str = "name";
pub const FIELD_SENSORS: &str = "sensors";
pub const FIELD_PORT_FORWARD: &str = "port_forward";

/// Flow step ids
pub const STEP_USER: &str = "user";
pub const STEP_DISCOVERY: &str = "discovery";
pub const STEP_IMPORT: &str = "import";
