use crate::avatar::AvatarFetcher;
use crate::config::BridgeConfig;
use crate::ids::{ContentUri, UserId};
use crate::intent::{Appservice, Intent};
use crate::portal::{DirectPortal, PortalDirectory, PuppetMetaUpdate};
use crate::puppet::PuppetContext;
use crate::puppet_registry::PuppetRegistry;
use crate::remote::{Member, RemoteSession, RemoteUser};
use crate::state::SessionState;
use crate::user::User;
use anyhow::{anyhow, bail, Result as AnyResult};
use async_trait::async_trait;
use bridge_db::{Database, DbError, DbResult, PuppetFilter, PuppetRow, PuppetStore, UserRow, UserStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

pub(crate) const TEST_CONFIG: &str = r#"
[homeserver]
address = "https://matrix.example.com"
domain = "example.com"

[bridge]
username_template = "discord_{userid}"
displayname_template = "{displayname}{bot}"
"#;

pub(crate) fn test_config() -> BridgeConfig {
    BridgeConfig::from_toml_str(TEST_CONFIG).unwrap()
}

/// Polls `cond` until it holds, failing the test after a second.
pub(crate) async fn wait_until<F: Fn() -> bool>(cond: F) {
    let waited = tokio::time::timeout(Duration::from_secs(1), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

/// Gives spawned propagation tasks time to run.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub(crate) struct MockIntent {
    user_id: UserId,
    register_calls: AtomicUsize,
    display_name_calls: AtomicUsize,
    avatar_calls: AtomicUsize,
    uploads: AtomicUsize,
    fail_register: AtomicBool,
    fail_display_name: AtomicBool,
    fail_avatar: AtomicBool,
    last_avatar: Mutex<ContentUri>,
    display_name_gate: AsyncMutex<()>,
}

impl MockIntent {
    pub(crate) fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            register_calls: AtomicUsize::new(0),
            display_name_calls: AtomicUsize::new(0),
            avatar_calls: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            fail_register: AtomicBool::new(false),
            fail_display_name: AtomicBool::new(false),
            fail_avatar: AtomicBool::new(false),
            last_avatar: Mutex::new(ContentUri::empty()),
            display_name_gate: AsyncMutex::new(()),
        }
    }

    /// Display name writes block until the returned guard is dropped.
    pub(crate) async fn pause_display_name(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.display_name_gate.lock().await
    }

    pub(crate) fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn display_name_calls(&self) -> usize {
        self.display_name_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn avatar_calls(&self) -> usize {
        self.avatar_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub(crate) fn last_avatar(&self) -> ContentUri {
        self.last_avatar.lock().unwrap().clone()
    }

    pub(crate) fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_display_name(&self, fail: bool) {
        self.fail_display_name.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_avatar(&self, fail: bool) {
        self.fail_avatar.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Intent for MockIntent {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    async fn ensure_registered(&self) -> AnyResult<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            bail!("M_EXCLUSIVE: registration failed");
        }
        Ok(())
    }

    async fn set_display_name(&self, _name: &str) -> AnyResult<()> {
        self.display_name_calls.fetch_add(1, Ordering::SeqCst);
        let _pass = self.display_name_gate.lock().await;
        if self.fail_display_name.load(Ordering::SeqCst) {
            bail!("set displayname failed");
        }
        Ok(())
    }

    async fn set_avatar_url(&self, uri: &ContentUri) -> AnyResult<()> {
        self.avatar_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_avatar.load(Ordering::SeqCst) {
            bail!("set avatar failed");
        }
        *self.last_avatar.lock().unwrap() = uri.clone();
        Ok(())
    }

    async fn upload_media(&self, data: Vec<u8>, _mime: &str) -> AnyResult<ContentUri> {
        let seq = self.uploads.fetch_add(1, Ordering::SeqCst);
        if data.is_empty() {
            bail!("empty upload");
        }
        Ok(ContentUri::new(
            "example.com",
            &format!("{}-{}", self.user_id.localpart(), seq),
        ))
    }
}

pub(crate) struct MockAppservice {
    intents: Mutex<HashMap<UserId, Arc<MockIntent>>>,
    double_puppets: Mutex<HashMap<UserId, Arc<MockIntent>>>,
}

impl MockAppservice {
    pub(crate) fn new() -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            double_puppets: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn enable_double_puppet(&self, user_id: &UserId) -> Arc<MockIntent> {
        let intent = Arc::new(MockIntent::new(user_id.clone()));
        self.double_puppets
            .lock()
            .unwrap()
            .insert(user_id.clone(), intent.clone());
        intent
    }

    pub(crate) fn mock_intent(&self, user_id: &UserId) -> Arc<MockIntent> {
        self.intents
            .lock()
            .unwrap()
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(MockIntent::new(user_id.clone())))
            .clone()
    }
}

impl Appservice for MockAppservice {
    fn intent(&self, user_id: &UserId) -> Arc<dyn Intent> {
        self.mock_intent(user_id)
    }

    fn double_puppet_intent(&self, user_id: &UserId) -> Option<Arc<dyn Intent>> {
        let intent = self.double_puppets.lock().unwrap().get(user_id).cloned()?;
        Some(intent as Arc<dyn Intent>)
    }
}

pub(crate) struct MockAvatarFetcher {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl MockAvatarFetcher {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AvatarFetcher for MockAvatarFetcher {
    async fn fetch(&self, url: &str) -> AnyResult<(Vec<u8>, String)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("GET {} returned 404 Not Found", url);
        }
        Ok((url.as_bytes().to_vec(), "image/png".to_string()))
    }
}

#[derive(Default)]
struct MockPortalMeta {
    name: String,
    avatar_id: String,
    avatar_url: ContentUri,
}

pub(crate) struct MockPortal {
    key: String,
    create_lock: AsyncMutex<()>,
    meta: Mutex<MockPortalMeta>,
    update_calls: AtomicUsize,
    bridge_info_calls: AtomicUsize,
    fail_update: AtomicBool,
}

impl MockPortal {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            create_lock: AsyncMutex::new(()),
            meta: Mutex::new(MockPortalMeta::default()),
            update_calls: AtomicUsize::new(0),
            bridge_info_calls: AtomicUsize::new(0),
            fail_update: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> String {
        self.meta.lock().unwrap().name.clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        self.meta.lock().unwrap().name = name.to_string();
    }

    pub(crate) fn avatar_id(&self) -> String {
        self.meta.lock().unwrap().avatar_id.clone()
    }

    pub(crate) fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn bridge_info_calls(&self) -> usize {
        self.bridge_info_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DirectPortal for MockPortal {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn room_create_lock(&self) -> &AsyncMutex<()> {
        &self.create_lock
    }

    fn apply_puppet_meta(&self, update: &PuppetMetaUpdate) -> bool {
        let mut meta = self.meta.lock().unwrap();
        match update {
            PuppetMetaUpdate::Name(name) => {
                if meta.name == *name {
                    return false;
                }
                meta.name = name.clone();
            }
            PuppetMetaUpdate::Avatar {
                avatar_id,
                avatar_url,
            } => {
                if meta.avatar_id == *avatar_id && meta.avatar_url == *avatar_url {
                    return false;
                }
                meta.avatar_id = avatar_id.clone();
                meta.avatar_url = avatar_url.clone();
            }
        }
        true
    }

    async fn update(&self) -> AnyResult<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_update.load(Ordering::SeqCst) {
            bail!("portal save failed");
        }
        Ok(())
    }

    async fn update_bridge_info(&self) -> AnyResult<()> {
        self.bridge_info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct MockPortalDirectory {
    dms: Mutex<Vec<(String, Arc<MockPortal>)>>,
}

impl MockPortalDirectory {
    pub(crate) fn new() -> Self {
        Self {
            dms: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add_dm(&self, remote_id: &str, key: &str) -> Arc<MockPortal> {
        let portal = Arc::new(MockPortal::new(key));
        self.dms
            .lock()
            .unwrap()
            .push((remote_id.to_string(), portal.clone()));
        portal
    }
}

impl PortalDirectory for MockPortalDirectory {
    fn dm_portals_with(&self, remote_id: &str) -> Vec<Arc<dyn DirectPortal>> {
        self.dms
            .lock()
            .unwrap()
            .iter()
            .filter(|(other, _)| other == remote_id)
            .map(|(_, portal)| portal.clone() as Arc<dyn DirectPortal>)
            .collect()
    }
}

pub(crate) struct MockRemoteSession {
    users: Mutex<HashMap<String, RemoteUser>>,
    members: Mutex<HashMap<(String, String), Member>>,
    user_fetches: AtomicUsize,
    member_fetches: AtomicUsize,
}

impl MockRemoteSession {
    pub(crate) fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            members: Mutex::new(HashMap::new()),
            user_fetches: AtomicUsize::new(0),
            member_fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn add_user(&self, user: RemoteUser) {
        self.users.lock().unwrap().insert(user.id.clone(), user);
    }

    pub(crate) fn add_member(&self, member: Member) {
        self.members
            .lock()
            .unwrap()
            .insert((member.guild_id.clone(), member.user_id.clone()), member);
    }

    pub(crate) fn user_fetches(&self) -> usize {
        self.user_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn member_fetches(&self) -> usize {
        self.member_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSession for MockRemoteSession {
    async fn fetch_user(&self, user_id: &str) -> AnyResult<RemoteUser> {
        self.user_fetches.fetch_add(1, Ordering::SeqCst);
        self.users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP 404 Not Found: unknown user {}", user_id))
    }

    async fn fetch_guild_member(&self, guild_id: &str, user_id: &str) -> AnyResult<Member> {
        self.member_fetches.fetch_add(1, Ordering::SeqCst);
        self.members
            .lock()
            .unwrap()
            .get(&(guild_id.to_string(), user_id.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("HTTP 403 Forbidden: guild {}", guild_id))
    }
}

/// Store whose every call fails, for the fatal paths.
pub(crate) struct FailingPuppetStore;

impl PuppetStore for FailingPuppetStore {
    fn get(&self, id: &str) -> DbResult<Option<PuppetRow>> {
        Err(DbError::InvalidRow(format!("puppet {}", id)))
    }

    fn get_by_custom_mxid(&self, mxid: &str) -> DbResult<Option<PuppetRow>> {
        Err(DbError::InvalidRow(format!("claim {}", mxid)))
    }

    fn get_all(&self, _filter: PuppetFilter) -> DbResult<Vec<PuppetRow>> {
        Err(DbError::InvalidRow("scan".to_string()))
    }

    fn insert(&self, puppet: &PuppetRow) -> DbResult<()> {
        Err(DbError::InvalidRow(puppet.id.clone()))
    }

    fn update(&self, puppet: &PuppetRow) -> DbResult<()> {
        Err(DbError::InvalidRow(puppet.id.clone()))
    }
}

/// In-memory store that rejects every row update.
pub(crate) struct UpdateFailingStore {
    inner: Database,
}

impl UpdateFailingStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: Database::open_in_memory().unwrap(),
        }
    }
}

impl PuppetStore for UpdateFailingStore {
    fn get(&self, id: &str) -> DbResult<Option<PuppetRow>> {
        self.inner.get(id)
    }

    fn get_by_custom_mxid(&self, mxid: &str) -> DbResult<Option<PuppetRow>> {
        self.inner.get_by_custom_mxid(mxid)
    }

    fn get_all(&self, filter: PuppetFilter) -> DbResult<Vec<PuppetRow>> {
        self.inner.get_all(filter)
    }

    fn insert(&self, puppet: &PuppetRow) -> DbResult<()> {
        self.inner.insert(puppet)
    }

    fn update(&self, puppet: &PuppetRow) -> DbResult<()> {
        Err(DbError::InvalidRow(format!("update of {} rejected", puppet.id)))
    }
}

pub(crate) struct TestHarness {
    pub db: Arc<Database>,
    pub appservice: Arc<MockAppservice>,
    pub portals: Arc<MockPortalDirectory>,
    pub avatars: Arc<MockAvatarFetcher>,
    pub registry: PuppetRegistry,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        Self::build(db.clone(), db)
    }

    pub(crate) fn with_store(store: Arc<dyn PuppetStore>) -> Self {
        Self::build(Arc::new(Database::open_in_memory().unwrap()), store)
    }

    fn build(db: Arc<Database>, store: Arc<dyn PuppetStore>) -> Self {
        let appservice = Arc::new(MockAppservice::new());
        let portals = Arc::new(MockPortalDirectory::new());
        let avatars = Arc::new(MockAvatarFetcher::new());
        let ctx = Arc::new(PuppetContext {
            naming: test_config().puppet_naming().unwrap(),
            store,
            appservice: appservice.clone(),
            portals: portals.clone(),
            avatars: avatars.clone(),
        });
        Self {
            db,
            appservice,
            portals,
            avatars,
            registry: PuppetRegistry::new(ctx),
        }
    }

    pub(crate) fn user(&self, mxid: &str, discord_id: &str, session: Arc<MockRemoteSession>) -> User {
        self.user_with(mxid, discord_id, session, false)
    }

    pub(crate) fn user_with(
        &self,
        mxid: &str,
        discord_id: &str,
        session: Arc<MockRemoteSession>,
        enable_dm_bridging: bool,
    ) -> User {
        let mut row = UserRow::new(mxid);
        row.discord_id = discord_id.to_string();
        self.db.insert_user(&row).unwrap();
        User::new(
            row,
            session,
            Arc::new(SessionState::new()),
            enable_dm_bridging,
            self.db.clone(),
        )
        .unwrap()
    }
}
