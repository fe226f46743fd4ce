pub const TOPIC_DEHYDRATOR_STATE: &str = "appliance/dehydrator/state";
pub const TOPIC_DEHYDRATOR_STATUS: &str = "appliance/dehydrator/status";
pub const TOPIC_CMD_POWER: &str = "appliance/dehydrator/cmnd/power";

pub const TOPIC_PLANTHOST_HUMIDITY: &str = "appliance/planthost/humidity";
pub const TOPIC_PLANTHOST_STATUS: &str = "appliance/planthost/status";
