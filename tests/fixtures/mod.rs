//! Test fixtures
//!
//! Writes a trimmed-down upstream Harbor chart, as `helm pull` would leave
//! it, and a modifications tree that exercises every patch step.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use harbor_modifier::config::ConfigOverrides;
use harbor_modifier::mock::MockChartTool;
use harbor_modifier::steps::{DATABASE_SUBSTITUTIONS, REDUNDANT_TEMPLATE};
use harbor_modifier::EffectiveConfig;
use tempfile::TempDir;
use walkdir::WalkDir;

pub const UPSTREAM_CHART: &str = "\
apiVersion: v1
name: harbor
version: 1.18.0
appVersion: 2.14.0
description: An open source trusted cloud native registry that stores, signs, and scans content
dependencies:
  - name: redis
    version: 17.0.0
    repository: https://charts.bitnami.com/bitnami
    condition: redis.enabled
";

pub const UPSTREAM_VALUES: &str = "\
expose:
  type: ingress
  tls:
    enabled: true
  ingress:
    hosts:
      core: core.harbor.domain
externalURL: https://core.harbor.domain
database:
  type: internal
  internal:
    password: changeit
    shmSizeLimit: 512Mi
  external:
    host: 192.168.0.1
    port: \"5432\"
";

pub const UPSTREAM_INGRESS: &str = "apiVersion: networking.k8s.io/v1\nkind: Ingress\n";

pub const UPSTREAM_CORE_DEPLOYMENT: &str = "apiVersion: apps/v1\nkind: Deployment\n";

pub const OVERLAY_CORE_DEPLOYMENT: &str =
    "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  annotations:\n    reliza.io/overlay: \"true\"\n";

pub const TRAEFIK_TEMPLATE: &str = "\
{{- if .Values.expose.traefik.enabled }}
apiVersion: traefik.io/v1alpha1
kind: IngressRoute
metadata:
  name: {{ template \"harbor.fullname\" . }}
{{- end }}
";

pub const RELIZA_VALUES: &str = "\
relizaPostgresql:
  enabled: true
  auth:
    username: harbor
    database: registry
";

pub const RELIZA_CHART: &str = "\
dependencies:
  - name: postgresql
    alias: relizaPostgresql
    version: 1.0.0
    repository: https://registry.relizahub.com/chartrepo/library
    condition: relizaPostgresql.enabled
";

pub const IGNORE_RULES: &str = "*.orig\nREADME.md.gotmpl\n";

/// `_helpers.tpl` with the four upstream database helper definitions
pub fn upstream_helpers() -> String {
    let mut helpers = String::from(
        "{{- define \"harbor.fullname\" -}}\n  {{- .Release.Name -}}\n{{- end -}}\n",
    );
    for substitution in &DATABASE_SUBSTITUTIONS {
        helpers.push('\n');
        helpers.push_str(substitution.old);
        helpers.push('\n');
    }
    helpers
}

fn write(root: &Path, relative: &str, content: &str) -> io::Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

/// Write the upstream chart into `dir`
pub fn write_upstream_chart(dir: &Path) -> io::Result<()> {
    write(dir, "Chart.yaml", UPSTREAM_CHART)?;
    write(dir, "values.yaml", UPSTREAM_VALUES)?;
    write(dir, ".helmignore", ".git/\n*.swp\n")?;
    write(dir, "templates/_helpers.tpl", &upstream_helpers())?;
    write(dir, "templates/ingress/ingress.yaml", UPSTREAM_INGRESS)?;
    write(dir, "templates/core/core-dpl.yaml", UPSTREAM_CORE_DEPLOYMENT)?;
    write(dir, "templates/database/database-ss.yaml", "kind: StatefulSet\n")?;
    write(dir, "templates/database/database-svc.yaml", "kind: Service\n")?;
    write(dir, "templates/database/database-secret.yaml", "kind: Secret\n")
}

/// Write a modifications tree touching every step into `dir`
pub fn write_modifications(dir: &Path) -> io::Result<()> {
    write(
        dir,
        "helpers/reliza-postgresql.tpl",
        &format!(
            "{}{{{{- define \"harbor.relizapostgresql.port\" -}}}}5432{{{{- end -}}}}\n",
            REDUNDANT_TEMPLATE.old
        ),
    )?;
    write(dir, "templates/traefik/ingressroute.yaml", TRAEFIK_TEMPLATE)?;
    write(dir, "templates/ingress/ingress.yaml", "kind: Ingress\n# custom\n")?;
    write(dir, "templates/README.md", "not a template\n")?;
    write(dir, "values/reliza-postgresql.yaml", RELIZA_VALUES)?;
    write(dir, "chart/dependencies.yaml", RELIZA_CHART)?;
    write(dir, ".helmignore", IGNORE_RULES)?;
    write(dir, "template-overlays/core/core-dpl.yaml", OVERLAY_CORE_DEPLOYMENT)
}

/// A project dir with a modifications tree and default configuration
pub fn project() -> (TempDir, EffectiveConfig) {
    let dir = TempDir::new().unwrap();
    write_modifications(&dir.path().join("modifications")).unwrap();
    let config = EffectiveConfig::build(dir.path(), None, &ConfigOverrides::default()).unwrap();
    (dir, config)
}

/// A project dir whose chart dir already holds the upstream chart
pub fn fetched_project() -> (TempDir, EffectiveConfig) {
    let (dir, config) = project();
    write_upstream_chart(&config.chart_dir()).unwrap();
    (dir, config)
}

/// Chart tool whose `pull` produces the upstream chart
pub fn mock_tool() -> MockChartTool {
    MockChartTool::new().with_chart(write_upstream_chart)
}

/// Every file under `dir`, by relative path
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(dir).unwrap().to_path_buf();
            (relative, fs::read(e.path()).unwrap())
        })
        .collect()
}

pub fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}
