//! Dynamic configuration controller.
//!
//! Owns the live registry of job configurations, dispatches inbound
//! runtime commands against it, and emits configuration groups when a
//! command mutates state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::discovery::GroupSender;
use crate::jobcfg::config::PROVIDER_DYNCFG;
use crate::jobcfg::{Config, Group, ModuleRegistry};
use crate::observability::metrics;
use crate::protocol::{error_payload, Function, FunctionRegistry, HostApi, JobStatus, JobType};

const CONTENT_TYPE_YAML: &str = "application/yaml";
const CONTENT_TYPE_JSON: &str = "application/json";

/// Runtime commands the controller answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    GetJobConfig,
    GetJobConfigSchema,
    SetJobConfig,
    DeleteJob,
    Unimplemented,
}

/// Command name → kind, built once at startup. Plugin- and
/// module-level config commands are accepted on the wire but always
/// rejected.
const COMMANDS: &[(&str, Command)] = &[
    ("get_job_config", Command::GetJobConfig),
    ("get_job_config_schema", Command::GetJobConfigSchema),
    ("set_job_config", Command::SetJobConfig),
    ("delete_job", Command::DeleteJob),
    ("get_plugin_config", Command::Unimplemented),
    ("set_plugin_config", Command::Unimplemented),
    ("get_module_config", Command::Unimplemented),
    ("set_module_config", Command::Unimplemented),
    ("delete_module", Command::Unimplemented),
];

pub struct DyncfgController {
    api: Arc<dyn HostApi>,
    modules: Arc<ModuleRegistry>,
    out: GroupSender,
    /// Last known config per job identity, for any provider. Never
    /// locked across a host-API call or a channel send.
    configs: Mutex<HashMap<String, Config>>,
}

impl DyncfgController {
    pub fn new(api: Arc<dyn HostApi>, modules: Arc<ModuleRegistry>, out: GroupSender) -> Arc<Self> {
        Arc::new(Self { api, modules, out, configs: Mutex::new(HashMap::new()) })
    }

    /// Install one handler per runtime command.
    pub fn install_handlers(self: &Arc<Self>, registry: &dyn FunctionRegistry) {
        for &(name, kind) in COMMANDS {
            let ctrl = Arc::clone(self);
            registry.register(name, Box::new(move |fun| ctrl.dispatch(kind, fun)));
        }
    }

    /// Announce dyncfg support to the host, then sleep until shutdown.
    /// A reload signal repeats the announcement from a clean slate.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
        mut reload: broadcast::Receiver<()>,
    ) {
        self.announce();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("dyncfg controller stopping");
                    return;
                }
                result = reload.recv() => match result {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        tracing::info!("reload requested, re-announcing dyncfg state");
                        self.announce();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // no reloads can arrive anymore; wait out shutdown
                        let _ = shutdown.recv().await;
                        tracing::info!("dyncfg controller stopping");
                        return;
                    }
                }
            }
        }
    }

    fn announce(&self) {
        log_host_err("reset", self.api.reset());
        log_host_err("enable dyncfg", self.api.enable_dyncfg());
        for module in self.modules.names() {
            log_host_err("register module", self.api.register_module(module));
        }
    }

    /// Record a config the scheduler observed from any provider.
    /// Ownership does not transfer: this is bookkeeping so read and
    /// delete commands can answer for every known job.
    pub fn register(&self, cfg: &Config) {
        let key = cfg.identity();
        {
            let mut configs = self.lock_configs();
            configs.insert(key, cfg.clone());
        }
        if cfg.provider() != PROVIDER_DYNCFG {
            log_host_err(
                "register job",
                self.api.register_job(&cfg.module(), &cfg.job_name(), JobType::Stock),
            );
        }
    }

    /// Forget a config the scheduler stopped running.
    pub fn unregister(&self, cfg: &Config) {
        {
            let mut configs = self.lock_configs();
            configs.remove(&cfg.identity());
        }
        log_host_err("remove job", self.api.remove_job(&cfg.module(), &cfg.job_name()));
    }

    /// Forward a job status report to the host. No local state effect.
    pub fn update_status(&self, cfg: &Config, status: JobStatus, reason: &str) {
        log_host_err(
            "report job status",
            self.api.report_job_status(&cfg.module(), &cfg.job_name(), status, reason),
        );
    }

    fn dispatch(&self, kind: Command, fun: Function) {
        match kind {
            Command::GetJobConfig => self.get_job_config(fun),
            Command::GetJobConfigSchema => self.get_job_config_schema(fun),
            Command::SetJobConfig => self.set_job_config(fun),
            Command::DeleteJob => self.delete_job(fun),
            Command::Unimplemented => {
                let message = format!("function '{}' is not implemented", fun.name);
                self.reject(&fun, &message);
            }
        }
    }

    fn get_job_config(&self, fun: Function) {
        let Some([module, job]) = require_args(&fun) else {
            return self.reject_arg_count(&fun, 2);
        };

        let stored = self.lock_configs().get(&identity_key(module, job)).cloned();
        match stored {
            Some(cfg) => match serde_yaml::to_string(&cfg) {
                Ok(doc) => self.success(&fun, CONTENT_TYPE_YAML, doc.trim_end()),
                Err(e) => self.reject(&fun, &format!("config serialization failed: {e}")),
            },
            None => self.reject(&fun, "config not found"),
        }
    }

    fn get_job_config_schema(&self, fun: Function) {
        let [module] = fun.args.as_slice() else {
            return self.reject_arg_count(&fun, 1);
        };

        match self.modules.lookup(module) {
            Some(info) => self.success(&fun, CONTENT_TYPE_JSON, &info.schema),
            None => self.reject(&fun, &format!("module {module} is not registered")),
        }
    }

    fn set_job_config(&self, fun: Function) {
        let Some([module, job]) = require_args(&fun) else {
            return self.reject_arg_count(&fun, 2);
        };
        if fun.payload.is_empty() {
            return self.reject(&fun, "missing configuration payload");
        }

        let Some(info) = self.modules.lookup(module) else {
            return self.reject(&fun, &format!("module {module} is not registered"));
        };

        let mut cfg: Config = match serde_yaml::from_slice(&fun.payload) {
            Ok(cfg) => cfg,
            Err(e) => return self.reject(&fun, &format!("invalid configuration payload: {e}")),
        };

        let source = format!("dyncfg/{module}/{job}");
        cfg.set_provider(PROVIDER_DYNCFG)
            .set_source(&source)
            .set_module(module)
            .set_name(job);
        cfg.apply(&info.defaults);

        // registry update happens-before the group send, so a get
        // issued after our reply always sees the new value
        {
            let mut configs = self.lock_configs();
            configs.insert(cfg.identity(), cfg.clone());
        }

        log_host_err("register job", self.api.register_job(module, job, JobType::Dyncfg));
        self.push(Group::new(source, vec![cfg]));
        self.success(&fun, CONTENT_TYPE_JSON, "");
    }

    fn delete_job(&self, fun: Function) {
        let Some([module, job]) = require_args(&fun) else {
            return self.reject_arg_count(&fun, 2);
        };

        enum Lookup {
            Missing,
            NotOwned,
            Removed(String),
        }

        // decide under the lock, act on the host outside it
        let lookup = {
            let mut configs = self.lock_configs();
            let key = identity_key(module, job);
            match configs.get(&key) {
                None => Lookup::Missing,
                Some(cfg) if cfg.provider() != PROVIDER_DYNCFG => Lookup::NotOwned,
                Some(cfg) => {
                    let source = cfg.source();
                    configs.remove(&key);
                    Lookup::Removed(source)
                }
            }
        };

        match lookup {
            Lookup::Removed(source) => {
                log_host_err("remove job", self.api.remove_job(module, job));
                self.push(Group::empty(source));
                self.success(&fun, CONTENT_TYPE_JSON, "");
            }
            Lookup::NotOwned => {
                self.reject(&fun, &format!("can't remove non Dyncfg job '{job}'"));
            }
            Lookup::Missing => self.reject(&fun, "config not found"),
        }
    }

    fn push(&self, group: Group) {
        if self.out.send(vec![group]).is_err() {
            tracing::warn!("output channel closed, discarding group");
        }
    }

    fn success(&self, fun: &Function, content_type: &str, payload: &str) {
        log_host_err(
            "function result",
            self.api.function_result_success(&fun.uid, content_type, payload),
        );
    }

    fn reject(&self, fun: &Function, message: &str) {
        tracing::debug!(function = %fun.name, uid = %fun.uid, message, "rejecting command");
        metrics::record_reject(&fun.name);
        log_host_err(
            "function result",
            self.api.function_result_reject(&fun.uid, CONTENT_TYPE_JSON, &error_payload(message)),
        );
    }

    fn reject_arg_count(&self, fun: &Function, want: usize) {
        let message = format!("expected {want} arguments, got {}", fun.args.len());
        self.reject(&fun, &message);
    }

    fn lock_configs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Config>> {
        self.configs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn identity_key(module: &str, job: &str) -> String {
    format!("{module}_{job}")
}

fn require_args(fun: &Function) -> Option<[&str; 2]> {
    match fun.args.as_slice() {
        [module, job] => Some([module.as_str(), job.as_str()]),
        _ => None,
    }
}

fn log_host_err(op: &str, res: std::io::Result<()>) {
    if let Err(e) = res {
        tracing::error!(op, error = %e, "host api call failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex as StdMutex;

    /// Records every host API call as one line, in call order.
    #[derive(Default)]
    struct RecordingApi {
        calls: StdMutex<Vec<String>>,
    }

    impl RecordingApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, line: String) -> io::Result<()> {
            self.calls.lock().unwrap().push(line);
            Ok(())
        }
    }

    impl HostApi for RecordingApi {
        fn enable_dyncfg(&self) -> io::Result<()> {
            self.push("enable".into())
        }
        fn reset(&self) -> io::Result<()> {
            self.push("reset".into())
        }
        fn register_module(&self, module: &str) -> io::Result<()> {
            self.push(format!("register-module {module}"))
        }
        fn register_job(&self, module: &str, job: &str, job_type: JobType) -> io::Result<()> {
            self.push(format!("register-job {module} {job} {job_type}"))
        }
        fn remove_job(&self, module: &str, job: &str) -> io::Result<()> {
            self.push(format!("remove-job {module} {job}"))
        }
        fn report_job_status(
            &self,
            module: &str,
            job: &str,
            status: JobStatus,
            _reason: &str,
        ) -> io::Result<()> {
            self.push(format!("status {module} {job} {status}"))
        }
        fn function_result_success(
            &self,
            uid: &str,
            _content_type: &str,
            payload: &str,
        ) -> io::Result<()> {
            self.push(format!("success {uid} {payload}"))
        }
        fn function_result_reject(
            &self,
            uid: &str,
            _content_type: &str,
            payload: &str,
        ) -> io::Result<()> {
            self.push(format!("reject {uid} {payload}"))
        }
    }

    fn controller() -> (Arc<DyncfgController>, Arc<RecordingApi>, crate::discovery::GroupReceiver)
    {
        let api = Arc::new(RecordingApi::default());
        let mut modules = ModuleRegistry::new();
        modules.register(
            "nginx",
            crate::jobcfg::ModuleInfo {
                schema: r#"{"type":"object"}"#.into(),
                defaults: serde_yaml::from_str("update_every: 1\ntimeout: 2").unwrap(),
            },
        );
        let (tx, rx) = crate::discovery::group_channel();
        let ctrl = DyncfgController::new(api.clone(), Arc::new(modules), tx);
        (ctrl, api, rx)
    }

    fn fun(name: &str, uid: &str, args: &[&str], payload: &str) -> Function {
        Function {
            name: name.into(),
            uid: uid.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            payload: payload.as_bytes().to_vec(),
            ..Function::default()
        }
    }

    fn last_call(api: &RecordingApi) -> String {
        api.calls().last().cloned().unwrap_or_default()
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let (ctrl, api, mut rx) = controller();

        ctrl.dispatch(
            Command::SetJobConfig,
            fun("set_job_config", "1-set", &["nginx", "web1"], "url: http://localhost\ntimeout: 9"),
        );
        assert!(last_call(&api).starts_with("success 1-set"));

        // the mutating command emitted exactly one group for its source
        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].source, "dyncfg/nginx/web1");
        assert_eq!(batch[0].configs.len(), 1);
        assert_eq!(batch[0].configs[0].provider(), "dyncfg");

        ctrl.dispatch(Command::GetJobConfig, fun("get_job_config", "2-get", &["nginx", "web1"], ""));
        let result = last_call(&api);
        assert!(result.starts_with("success 2-get"), "{result}");
        // payload keys survive, defaults fill the gaps
        let stored: Config = serde_yaml::from_str(result.strip_prefix("success 2-get ").unwrap()).unwrap();
        assert_eq!(stored.get("timeout"), Some(&serde_yaml::Value::from(9)));
        assert_eq!(stored.get("update_every"), Some(&serde_yaml::Value::from(1)));
        assert_eq!(stored.get("url"), Some(&serde_yaml::Value::from("http://localhost")));
    }

    #[test]
    fn test_get_unknown_job_rejects() {
        let (ctrl, api, _rx) = controller();
        ctrl.dispatch(Command::GetJobConfig, fun("get_job_config", "1-get", &["nginx", "ghost"], ""));
        assert_eq!(last_call(&api), r#"reject 1-get {"error":"config not found"}"#);
    }

    #[test]
    fn test_schema_lookup() {
        let (ctrl, api, _rx) = controller();

        ctrl.dispatch(
            Command::GetJobConfigSchema,
            fun("get_job_config_schema", "1-schema", &["nginx"], ""),
        );
        assert_eq!(last_call(&api), r#"success 1-schema {"type":"object"}"#);

        ctrl.dispatch(
            Command::GetJobConfigSchema,
            fun("get_job_config_schema", "2-schema", &["mysql"], ""),
        );
        assert_eq!(last_call(&api), r#"reject 2-schema {"error":"module mysql is not registered"}"#);
    }

    #[test]
    fn test_set_requires_payload() {
        let (ctrl, api, mut rx) = controller();
        ctrl.dispatch(Command::SetJobConfig, fun("set_job_config", "1-set", &["nginx", "web1"], ""));
        assert!(last_call(&api).starts_with("reject 1-set"));
        assert!(rx.try_recv().is_err(), "no group on rejected set");
    }

    #[test]
    fn test_set_rejects_malformed_payload() {
        let (ctrl, api, mut rx) = controller();
        ctrl.dispatch(
            Command::SetJobConfig,
            fun("set_job_config", "1-set", &["nginx", "web1"], "[not, a, mapping]"),
        );
        assert!(last_call(&api).starts_with("reject 1-set"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_delete_non_dyncfg_job_rejects() {
        let (ctrl, api, mut rx) = controller();

        let mut cfg: Config = serde_yaml::from_str("module: nginx\nname: web1").unwrap();
        cfg.set_source("/etc/jobs/nginx.yaml").set_provider("file reader");
        ctrl.register(&cfg);

        let job = cfg.job_name();
        ctrl.dispatch(Command::DeleteJob, fun("delete_job", "1-del", &["nginx", &job], ""));

        let result = last_call(&api);
        assert!(result.starts_with("reject 1-del"), "{result}");
        assert!(result.contains("non Dyncfg job"));
        assert!(rx.try_recv().is_err(), "no group on rejected delete");
    }

    #[test]
    fn test_delete_dyncfg_job_retracts_source() {
        let (ctrl, api, mut rx) = controller();

        ctrl.dispatch(
            Command::SetJobConfig,
            fun("set_job_config", "1-set", &["nginx", "web1"], "url: http://localhost"),
        );
        rx.try_recv().unwrap();

        ctrl.dispatch(Command::DeleteJob, fun("delete_job", "2-del", &["nginx", "web1"], ""));
        assert!(last_call(&api).starts_with("success 2-del"));

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch[0].source, "dyncfg/nginx/web1");
        assert!(batch[0].configs.is_empty());

        // the job is gone for subsequent reads
        ctrl.dispatch(Command::GetJobConfig, fun("get_job_config", "3-get", &["nginx", "web1"], ""));
        assert_eq!(last_call(&api), r#"reject 3-get {"error":"config not found"}"#);
    }

    #[test]
    fn test_delete_unknown_job_rejects() {
        let (ctrl, api, _rx) = controller();
        ctrl.dispatch(Command::DeleteJob, fun("delete_job", "1-del", &["nginx", "ghost"], ""));
        assert_eq!(last_call(&api), r#"reject 1-del {"error":"config not found"}"#);
    }

    #[test]
    fn test_arg_count_validated_before_payload() {
        let (ctrl, api, _rx) = controller();
        let cases: &[(Command, &str)] = &[
            (Command::GetJobConfig, "get_job_config"),
            (Command::GetJobConfigSchema, "get_job_config_schema"),
            (Command::SetJobConfig, "set_job_config"),
            (Command::DeleteJob, "delete_job"),
        ];
        for (i, (kind, name)) in cases.iter().enumerate() {
            let uid = format!("{i}-args");
            // three args is wrong for every command, payload present or not
            ctrl.dispatch(*kind, fun(name, &uid, &["a", "b", "c"], "module: nginx"));
            let result = last_call(&api);
            assert!(result.starts_with(&format!("reject {uid}")), "{name}: {result}");
            assert!(result.contains("arguments"), "{name}: {result}");
        }
    }

    #[test]
    fn test_unimplemented_commands_reject() {
        let (ctrl, api, _rx) = controller();
        ctrl.dispatch(Command::Unimplemented, fun("set_plugin_config", "1-x", &[], ""));
        assert_eq!(
            last_call(&api),
            r#"reject 1-x {"error":"function 'set_plugin_config' is not implemented"}"#,
        );
    }

    #[test]
    fn test_register_unregister_bookkeeping() {
        let (ctrl, api, _rx) = controller();

        let mut stock: Config = serde_yaml::from_str("module: nginx\nname: web1").unwrap();
        stock.set_source("/etc/jobs/nginx.yaml").set_provider("test");

        let mut owned: Config = serde_yaml::from_str("module: nginx\nname: web2").unwrap();
        owned.set_source("dyncfg/nginx/web2").set_provider("dyncfg");

        ctrl.register(&stock);
        ctrl.register(&owned);

        // only the non-dyncfg config triggers a host registration
        let registrations =
            api.calls().iter().filter(|c| c.starts_with("register-job")).count();
        assert_eq!(registrations, 1);
        assert!(api.calls().iter().any(|c| c.contains("stock")));

        ctrl.unregister(&stock);
        ctrl.unregister(&owned);
        assert!(ctrl.lock_configs().is_empty(), "no residual registry entries");
    }

    #[test]
    fn test_announce_order() {
        let (ctrl, api, _rx) = controller();
        ctrl.announce();
        assert_eq!(api.calls(), vec!["reset", "enable", "register-module nginx"]);
    }

    #[test]
    fn test_update_status_forwards() {
        let (ctrl, api, _rx) = controller();
        let mut cfg: Config = serde_yaml::from_str("module: nginx\nname: web1").unwrap();
        cfg.set_source("dyncfg/nginx/web1").set_provider("dyncfg");
        ctrl.update_status(&cfg, JobStatus::Running, "started");
        assert_eq!(last_call(&api), "status nginx web1 running");
    }
}
