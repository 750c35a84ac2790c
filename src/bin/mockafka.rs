// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::Parser;
use mockafka::{setup_tracing, AppResult, AsyncApiConfig, Cluster, Hooks, RuntimeConfig, Store};
use tokio::runtime;
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about)]
pub struct CommandLine {
    /// path to the AsyncAPI document describing the cluster
    #[arg(short, long)]
    pub conf: PathBuf,
    /// path to the runtime options file (logging, connection limits)
    #[arg(short, long)]
    pub runtime: Option<PathBuf>,
}

fn main() -> AppResult<()> {
    let commandline = CommandLine::parse();
    let runtime_config = RuntimeConfig::load(commandline.runtime.as_ref())?;

    // startup tokio runtime
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async move {
        let _otel_guard = setup_tracing(&runtime_config.log)?;

        let config = AsyncApiConfig::load(&commandline.conf)?;
        let store = Store::from_config(&config, Hooks::default())?;
        let cluster = Cluster::start(store, &runtime_config.network).await?;
        info!(
            "cluster {} started with {} brokers",
            cluster.store().cluster_name(),
            cluster.addresses().len()
        );

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("listen for shutdown signal: {}", e);
        }
        info!("shutting down");
        cluster.shutdown().await;
        Ok(())
    })
}
