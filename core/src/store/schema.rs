// Schema version 1. Column names are the camelCase wire names shared with
// peers, mapped to snake_case on the Rust side.

diesel::table! {
    clipboard_items (id) {
        id -> Text,
        content -> Text,
        #[sql_name = "contentType"]
        content_type -> Text,
        timestamp -> BigInt,
        ttl -> BigInt,
        synced -> Bool,
        #[sql_name = "sourceDeviceId"]
        source_device_id -> Nullable<Text>,
        hash -> Text,
    }
}

diesel::table! {
    paired_devices (id) {
        id -> Text,
        name -> Text,
        #[sql_name = "publicKey"]
        public_key -> Text,
        #[sql_name = "certificateFingerprint"]
        certificate_fingerprint -> Text,
        #[sql_name = "lastSeen"]
        last_seen -> BigInt,
        #[sql_name = "isTrusted"]
        is_trusted -> Bool,
        #[sql_name = "fallbackAddress"]
        fallback_address -> Nullable<Text>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(clipboard_items, paired_devices);
