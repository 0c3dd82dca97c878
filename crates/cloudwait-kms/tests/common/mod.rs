#![allow(dead_code)]

use async_trait::async_trait;
use cloudwait::ApiError;
use cloudwait_kms::{
    ApiResult, ConnectionState, CreateGrantInput, CustomKeyStore, Grant, GrantListEntry,
    KeyManagementApi, KeyMetadata, KeyState, NOT_FOUND_CODE,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

pub const KEY_ID: &str = "1234abcd-12ab-34cd-56ef-1234567890ab";
pub const STORE_ID: &str = "cks-1234567890abcdef0";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn not_found<T>() -> ApiResult<T> {
    Err(ApiError::new(NOT_FOUND_CODE, "resource does not exist"))
}

pub fn api_error<T>(code: &str) -> ApiResult<T> {
    Err(ApiError::new(code, "scripted failure"))
}

pub fn key(state: KeyState) -> KeyMetadata {
    KeyMetadata {
        key_id: KEY_ID.to_string(),
        arn: format!("arn:aws:kms:us-west-2:111122223333:key/{KEY_ID}"),
        description: String::new(),
        enabled: state == KeyState::Enabled,
        key_state: state,
        creation_date: None,
        valid_to: None,
    }
}

pub fn store(state: ConnectionState) -> CustomKeyStore {
    CustomKeyStore {
        custom_key_store_id: STORE_ID.to_string(),
        custom_key_store_name: "primary".to_string(),
        connection_state: state,
        connection_error_code: (state == ConnectionState::Failed)
            .then(|| "NETWORK_ERRORS".to_string()),
    }
}

pub fn grant_entry(grant_id: &str) -> GrantListEntry {
    GrantListEntry {
        key_id: KEY_ID.to_string(),
        grant_id: grant_id.to_string(),
        grantee_principal: "arn:aws:iam::111122223333:role/app".to_string(),
        operations: vec!["Decrypt".to_string()],
    }
}

/// Replies for one API call; the last reply repeats forever
struct Script<T> {
    replies: VecDeque<ApiResult<T>>,
    last: Option<ApiResult<T>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            replies: VecDeque::new(),
            last: None,
        }
    }
}

impl<T: Clone> Script<T> {
    fn load(&mut self, replies: Vec<ApiResult<T>>) {
        self.last = replies.last().cloned();
        self.replies = replies.into();
    }

    fn next(&mut self, call: &str) -> ApiResult<T> {
        if let Some(reply) = self.replies.pop_front() {
            return reply;
        }
        self.last
            .clone()
            .unwrap_or_else(|| Err(ApiError::new("UnscriptedCall", call)))
    }
}

#[derive(Default)]
struct Scripts {
    describe_key: Script<KeyMetadata>,
    key_policy: Script<String>,
    rotation: Script<bool>,
    tags: Script<BTreeMap<String, String>>,
    store: Script<CustomKeyStore>,
    connect: Script<()>,
    disconnect: Script<()>,
    create_grant: Script<Grant>,
    find_grant: Script<Option<GrantListEntry>>,
}

/// In-memory key management service driven by scripted replies
#[derive(Default)]
pub struct ScriptedKms {
    scripts: Mutex<Scripts>,
    log: Mutex<Vec<&'static str>>,
}

impl ScriptedKms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe_key(self, replies: Vec<ApiResult<KeyMetadata>>) -> Self {
        self.scripts.lock().unwrap().describe_key.load(replies);
        self
    }

    pub fn key_policy(self, replies: Vec<ApiResult<String>>) -> Self {
        self.scripts.lock().unwrap().key_policy.load(replies);
        self
    }

    pub fn rotation(self, replies: Vec<ApiResult<bool>>) -> Self {
        self.scripts.lock().unwrap().rotation.load(replies);
        self
    }

    pub fn tags(self, replies: Vec<ApiResult<BTreeMap<String, String>>>) -> Self {
        self.scripts.lock().unwrap().tags.load(replies);
        self
    }

    pub fn store(self, replies: Vec<ApiResult<CustomKeyStore>>) -> Self {
        self.scripts.lock().unwrap().store.load(replies);
        self
    }

    pub fn connect(self, replies: Vec<ApiResult<()>>) -> Self {
        self.scripts.lock().unwrap().connect.load(replies);
        self
    }

    pub fn disconnect(self, replies: Vec<ApiResult<()>>) -> Self {
        self.scripts.lock().unwrap().disconnect.load(replies);
        self
    }

    pub fn create_grant(self, replies: Vec<ApiResult<Grant>>) -> Self {
        self.scripts.lock().unwrap().create_grant.load(replies);
        self
    }

    pub fn find_grant(self, replies: Vec<ApiResult<Option<GrantListEntry>>>) -> Self {
        self.scripts.lock().unwrap().find_grant.load(replies);
        self
    }

    /// Names of the calls made so far, in order
    pub fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }

    pub fn calls(&self, name: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|call| **call == name).count()
    }

    fn record(&self, name: &'static str) {
        self.log.lock().unwrap().push(name);
    }
}

#[async_trait]
impl KeyManagementApi for ScriptedKms {
    async fn describe_key(&self, _key_id: &str) -> ApiResult<KeyMetadata> {
        self.record("describe_key");
        self.scripts.lock().unwrap().describe_key.next("describe_key")
    }

    async fn get_key_policy(&self, _key_id: &str) -> ApiResult<String> {
        self.record("get_key_policy");
        self.scripts.lock().unwrap().key_policy.next("get_key_policy")
    }

    async fn get_key_rotation_status(&self, _key_id: &str) -> ApiResult<bool> {
        self.record("get_key_rotation_status");
        self.scripts.lock().unwrap().rotation.next("get_key_rotation_status")
    }

    async fn list_resource_tags(&self, _key_id: &str) -> ApiResult<BTreeMap<String, String>> {
        self.record("list_resource_tags");
        self.scripts.lock().unwrap().tags.next("list_resource_tags")
    }

    async fn describe_custom_key_store(&self, _store_id: &str) -> ApiResult<CustomKeyStore> {
        self.record("describe_custom_key_store");
        self.scripts.lock().unwrap().store.next("describe_custom_key_store")
    }

    async fn connect_custom_key_store(&self, _store_id: &str) -> ApiResult<()> {
        self.record("connect_custom_key_store");
        self.scripts.lock().unwrap().connect.next("connect_custom_key_store")
    }

    async fn disconnect_custom_key_store(&self, _store_id: &str) -> ApiResult<()> {
        self.record("disconnect_custom_key_store");
        self.scripts.lock().unwrap().disconnect.next("disconnect_custom_key_store")
    }

    async fn create_grant(&self, _input: &CreateGrantInput) -> ApiResult<Grant> {
        self.record("create_grant");
        self.scripts.lock().unwrap().create_grant.next("create_grant")
    }

    async fn find_grant(&self, _key_id: &str, _grant_id: &str) -> ApiResult<Option<GrantListEntry>> {
        self.record("find_grant");
        self.scripts.lock().unwrap().find_grant.next("find_grant")
    }
}
