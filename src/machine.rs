use crate::priv_prelude::*;

/// A virtual node of the lab network.
///
/// A machine has its own tokio runtime running in a separate network-isolated thread. Use
/// [`spawn`](crate::Machine::spawn) to spawn futures on this runtime and wait for their result.
/// Anything those futures do with the network (open sockets, add routes, read `/proc/net`) sees
/// only the machine's own interfaces and routing table. Use
/// [`add_ether_iface`](crate::Machine::add_ether_iface) to give the machine a virtual ethernet
/// interface and use the returned [`EtherIface`](crate::EtherIface) to plug it into a switch.
///
/// Dropping the machine will shutdown its runtime and cancel any futures executing on it, causing
/// any associated [`JoinHandle`](crate::JoinHandle)s to return `None`.
pub struct Machine {
    name: String,
    #[allow(dead_code)]
    join_handle: namespace::JoinHandle<()>,
    task_tx_opt: Option<mpsc::UnboundedSender<Pin<Box<dyn Future<Output = ()> + Send + 'static>>>>,
}

/// A handle to a future executing on a [`Machine`](crate::Machine).
///
/// You can await a `JoinHandle` (or call [`join`](crate::JoinHandle::join)) to get the future's
/// result.
pub struct JoinHandle<R> {
    ret_rx: oneshot::Receiver<thread::Result<R>>,
}

impl Machine {
    /// Create a new machine. The machine's hostname is set to `name`. A machine initially has no
    /// network interfaces other than its loopback interface.
    pub fn new(name: impl Into<String>) -> io::Result<Machine> {
        let name = name.into();
        let (task_tx, mut task_rx) = mpsc::unbounded::<Pin<Box<dyn Future<Output = ()> + Send + 'static>>>();
        let (startup_tx, startup_rx) = oneshot::channel();
        let join_handle_res = namespace::spawn(&name, move || {
            if let Err(err) = iface::configure::put_up("lo") {
                let _ = startup_tx.send(Err(err));
                return;
            }
            let runtime_res = tokio::runtime::Runtime::new();
            let runtime = match runtime_res {
                Ok(runtime) => {
                    let _ = startup_tx.send(Ok(()));
                    runtime
                },
                Err(err) => {
                    let _ = startup_tx.send(Err(err));
                    return;
                },
            };
            runtime.block_on(async move {
                while let Some(task) = task_rx.next().await {
                    let _detach = tokio::spawn(task);
                }
            });
            runtime.shutdown_background();
        });
        let join_handle = join_handle_res?;

        match startup_rx.recv() {
            Ok(res) => res?,
            Err(_recv_err) => {
                let msg = format!("runtime thread of machine {} died during startup", name);
                return Err(io::Error::new(io::ErrorKind::Other, msg));
            },
        }
        debug!("started machine {}", name);
        let task_tx_opt = Some(task_tx);
        let machine = Machine { name, join_handle, task_tx_opt };
        Ok(machine)
    }

    /// The machine's name (and hostname).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes a future on the machine. The future will start executing immediately. You can use
    /// the returned [`JoinHandle`](crate::JoinHandle) to await the future's result.
    pub fn spawn<F, R>(&self, future: F) -> JoinHandle<R>
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let (ret_tx, ret_rx) = oneshot::channel();
        let task = Box::pin(async move {
            let ret = panic::AssertUnwindSafe(future).catch_unwind().await;
            let _ = ret_tx.send(ret);
        });
        // If the runtime has gone away the task (and `ret_tx`) is dropped, so the join handle
        // resolves to `None`.
        if let Some(task_tx) = self.task_tx_opt.as_ref() {
            let _ = task_tx.unbounded_send(task);
        }
        JoinHandle { ret_rx }
    }

    /// Runs a future on the machine and waits for its result. Panics inside the future are
    /// propagated to the caller.
    pub async fn run<F, R>(&self, future: F) -> io::Result<R>
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        match self.spawn(future).join().await {
            Ok(Some(ret)) => Ok(ret),
            Ok(None) => {
                let msg = format!("machine {} shut down", self.name);
                Err(io::Error::new(io::ErrorKind::BrokenPipe, msg))
            },
            Err(err) => panic::resume_unwind(err),
        }
    }

    /// Adds a virtual ethernet interface to the machine. See the
    /// [`EtherIfaceBuilder`](crate::EtherIfaceBuilder) details.
    pub fn add_ether_iface(&self) -> EtherIfaceBuilder<'_> {
        EtherIfaceBuilder::new(self)
    }

    /// Writes a kernel parameter inside the machine's namespace, like `sysctl key=value`.
    pub async fn set_sysctl(&self, key: &str, value: &str) -> io::Result<()> {
        let path = sysctl_path(key);
        let value = format!("{}\n", value);
        trace!("{}: sysctl {} = {}", self.name, key, value.trim_end());
        self.run(async move {
            std::fs::write(&path, value.as_bytes())
            .map_err(|err| io::Error::new(err.kind(), format!("writing {}: {}", path.display(), err)))
        }).await?
    }

    /// Enables or disables IPv4 forwarding between the machine's interfaces. A machine with
    /// forwarding enabled acts as a router.
    pub async fn set_ip_forwarding(&self, enabled: bool) -> io::Result<()> {
        let value = if enabled { "1" } else { "0" };
        self.set_sysctl("net.ipv4.ip_forward", value).await
    }

    /// Installs a static route in the machine's routing table. If the route has no gateway it is
    /// attached to `iface_name_opt`; otherwise the kernel picks the interface through which the
    /// gateway is reachable.
    pub async fn add_ipv4_route(&self, route: Ipv4Route, iface_name_opt: Option<String>) -> io::Result<()> {
        debug!("{}: adding route {}", self.name, route);
        self.run(async move {
            iface::configure::add_ipv4_route(iface_name_opt.as_deref(), route.destination(), route.gateway())
        }).await?
    }

    /// Reads the machine's IPv4 routing table.
    pub async fn routing_table(&self) -> io::Result<RoutingTable> {
        self.run(async move {
            // /proc/self resolves to the thread group leader. This thread is the one living in the
            // namespace we want.
            let text = std::fs::read_to_string("/proc/thread-self/net/route")?;
            RoutingTable::from_str(&text)
        }).await?
    }
}

fn sysctl_path(key: &str) -> PathBuf {
    let mut path = PathBuf::from("/proc/sys");
    for component in key.split('.') {
        path.push(component);
    }
    path
}

impl Drop for Machine {
    fn drop(&mut self) {
        debug!("shutting down machine {}", self.name);
        let _task_tx = self.task_tx_opt.take();
    }
}

impl<R> JoinHandle<R> {
    /// Wait for the future executing on the machine to complete and get its result.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` if the future completed normally and returned `value`.
    /// * `Ok(None)` if the [`Machine`](crate::Machine) was dropped before the future completed.
    /// * `Err(panic_error)` if the future panicked.
    pub async fn join(self) -> thread::Result<Option<R>> {
        match self.ret_rx.await {
            Ok(Ok(val)) => Ok(Some(val)),
            Ok(Err(err)) => Err(err),
            Err(_recv_err) => Ok(None),
        }
    }

    /// Block the current thread, wait for the future executing on the machine the complete and get
    /// its result.
    pub fn join_blocking(self) -> thread::Result<Option<R>> {
        match self.ret_rx.recv() {
            Ok(Ok(val)) => Ok(Some(val)),
            Ok(Err(err)) => Err(err),
            Err(_recv_err) => Ok(None),
        }
    }
}

impl<R> IntoFuture for JoinHandle<R>
where
    R: Send + 'static,
{
    type Output = thread::Result<Option<R>>;
    type IntoFuture = Pin<Box<dyn Future<Output = thread::Result<Option<R>>> + Send + 'static>>;

    fn into_future(self) -> Pin<Box<dyn Future<Output = thread::Result<Option<R>>> + Send + 'static>> {
        Box::pin(self.join())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sysctl_keys_map_onto_proc_sys() {
        assert_eq!(sysctl_path("net.ipv4.ip_forward"), PathBuf::from("/proc/sys/net/ipv4/ip_forward"));
        assert_eq!(
            sysctl_path("net.ipv4.conf.all.rp_filter"),
            PathBuf::from("/proc/sys/net/ipv4/conf/all/rp_filter"),
        );
    }
}
