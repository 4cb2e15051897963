// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
	api::{Api, LogParams},
	config::{KubeConfigOptions, Kubeconfig},
	runtime::{
		watcher::{self, Event},
		WatchStreamExt,
	},
	Client, Config,
};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{LogOptions, LogStream, PodWatchEvent, PodWatchStream};

/// Production K8s client implementation using the kube crate.
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	/// Create a KubeClient from an explicit kubeconfig file, using its
	/// current context.
	pub async fn from_kubeconfig(path: &Path) -> Result<Self, K8sError> {
		let kubeconfig = Kubeconfig::read_from(path).map_err(|e| K8sError::Kubeconfig {
			message: format!("{}: {e}", path.display()),
		})?;
		let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
			.await
			.map_err(|e| K8sError::Kubeconfig {
				message: format!("{}: {e}", path.display()),
			})?;
		let client = Client::try_from(config)?;
		debug!(kubeconfig = %path.display(), "K8s client initialized");
		Ok(Self { client })
	}
}

fn adapt_watch_event(event: Result<Event<Pod>, watcher::Error>) -> Option<Result<PodWatchEvent, K8sError>> {
	match event {
		Ok(Event::Apply(pod)) | Ok(Event::InitApply(pod)) => Some(Ok(PodWatchEvent::Applied(pod))),
		Ok(Event::Delete(pod)) => Some(Ok(PodWatchEvent::Deleted(pod))),
		Ok(Event::Init) | Ok(Event::InitDone) => None,
		// The API server sent a Status object in place of a pod. Anything
		// else is a transport or re-list failure the watcher recovers from.
		Err(watcher::Error::WatchError(resp)) => Some(Ok(PodWatchEvent::Unrecognized {
			reason: format!("{}: {} ({})", resp.status, resp.message, resp.reason),
		})),
		Err(e) => Some(Err(K8sError::WatchError {
			message: e.to_string(),
		})),
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		match pods.get(name).await {
			Ok(pod) => Ok(pod),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::PodNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self))]
	async fn watch_pod(&self, name: &str, namespace: &str) -> Result<PodWatchStream, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let config = watcher::Config::default().fields(&format!("metadata.name={name}"));

		let stream = watcher::watcher(pods, config)
			.default_backoff()
			.filter_map(|event| futures::future::ready(adapt_watch_event(event)));
		debug!("pod watch started");
		Ok(Box::pin(stream))
	}

	async fn stream_logs(
		&self,
		name: &str,
		namespace: &str,
		container: &str,
		opts: LogOptions,
	) -> Result<LogStream, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let lp = LogParams {
			container: Some(container.to_string()),
			follow: true,
			tail_lines: opts.tail.map(i64::from),
			timestamps: opts.timestamps,
			..Default::default()
		};

		let stream = pods.log_stream(name, &lp).await.map_err(|e| match e {
			kube::Error::Api(ref err) if err.code == 404 => K8sError::PodNotFound { name: name.into() },
			_ => K8sError::StreamError {
				message: e.to_string(),
			},
		})?;

		let compat_stream = stream.compat();
		let chunks = tokio_util::io::ReaderStream::new(compat_stream);
		let mapped = chunks.map(|result| result.map_err(std::io::Error::other));
		Ok(Box::pin(mapped))
	}
}
