use crate::priv_prelude::*;

const STACK_ALIGN: usize = 16;

/// Handle to a thread running inside its own user, network and UTS namespaces.
pub struct JoinHandle<R> {
    stack_ptr: *mut [u8],
    child_tid: *mut libc::pid_t,
    ret_rx_opt: Option<oneshot::Receiver<thread::Result<R>>>,
}

unsafe impl<R: Send> Send for JoinHandle<R> {}
unsafe impl<R> Sync for JoinHandle<R> {}

impl<R> JoinHandle<R> {
    fn join_inner(&mut self, ret_rx: oneshot::Receiver<thread::Result<R>>) -> thread::Result<R> {
        let ret = match ret_rx.recv() {
            Ok(ret) => ret,
            Err(_recv_err) => Err(Box::new("namespace thread exited without returning") as Box<dyn std::any::Any + Send>),
        };
        loop {
            if 0 == unsafe { ptr::read_volatile(self.child_tid) } {
                break;
            }
            thread::yield_now();
        }
        let _child_tid = unsafe { Box::from_raw(self.child_tid) };
        let _stack_ptr = unsafe { Box::from_raw(self.stack_ptr) };
        ret
    }

    #[allow(unused)]
    pub fn join(mut self) -> thread::Result<R> {
        let ret_rx = self.ret_rx_opt.take().expect("join_inner has not already been called");
        self.join_inner(ret_rx)
    }
}

impl<R> Drop for JoinHandle<R> {
    fn drop(&mut self) {
        if let Some(ret_rx) = self.ret_rx_opt.take() {
            let _ret = self.join_inner(ret_rx);
        }
    }
}

struct CbData<R: Send + 'static> {
    func: Box<dyn FnOnce() -> R + Send + 'static>,
    ret_rx_tx: oneshot::Sender<io::Result<oneshot::Receiver<thread::Result<R>>>>,
    hostname: CString,
    uid: u32,
    gid: u32,
}

/// Runs `func` on a new thread inside fresh namespaces. Inside, the calling user is mapped to root
/// and the hostname is set to `hostname`, so anything that prints the hostname (or a shell
/// prompt) names the node it runs on.
pub fn spawn<F, R>(hostname: &str, func: F) -> io::Result<JoinHandle<R>>
where
    F: FnOnce() -> R,
    F: Send + 'static,
    R: Send + 'static,
{
    let hostname_str = hostname.to_owned();
    let hostname = match CString::new(hostname) {
        Ok(hostname) => hostname,
        Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidInput, err)),
    };

    let stack_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    let stack_size = cmp::max(stack_size, 4096);

    let mut stack = vec![0u8; stack_size + STACK_ALIGN];
    let stack_base = stack.as_mut_ptr();
    let stack = stack.into_boxed_slice();
    let stack_ptr = Box::into_raw(stack);

    let flags =
        libc::CLONE_CHILD_CLEARTID |
        libc::CLONE_FILES |
        libc::CLONE_IO |
        libc::CLONE_SIGHAND |
        libc::CLONE_VM |
        libc::CLONE_SYSVSEM |
        libc::CLONE_NEWNET |
        libc::CLONE_NEWUTS |
        libc::CLONE_NEWUSER;

    let uid = unsafe { libc::geteuid() };
    let gid = unsafe { libc::getegid() };
    let (ret_rx_tx, ret_rx_rx) = oneshot::channel();
    let stack_head = ((stack_base as usize + stack_size + STACK_ALIGN) & !(STACK_ALIGN - 1)) as *mut c_void;
    let func = Box::new(func);
    let arg: Box<CbData<R>> = Box::new(CbData { func, ret_rx_tx, hostname, uid, gid });
    let arg = Box::into_raw(arg) as *mut c_void;
    let child_tid = Box::new(!0);
    let child_tid = Box::into_raw(child_tid);

    let pid = unsafe {
        libc::clone(
            clone_cb::<R>,
            stack_head,
            flags,
            arg,
            ptr::null::<pid_t>(),
            ptr::null::<c_void>(),
            child_tid,
        )
    };
    if pid == -1 {
        let err = io::Error::last_os_error();
        let _child_tid = unsafe { Box::from_raw(child_tid) };
        let _stack_ptr = unsafe { Box::from_raw(stack_ptr) };
        let _arg = unsafe { Box::from_raw(arg as *mut CbData<R>) };
        if err.kind() == io::ErrorKind::PermissionDenied {
            return Err(permission_denied_error(uid, gid));
        }
        return Err(err);
    }
    let ret_rx_res = match ret_rx_rx.recv() {
        Ok(ret_rx_res) => ret_rx_res,
        Err(_recv_err) => Err(io::Error::new(io::ErrorKind::Other, "namespace setup thread died")),
    };
    let ret_rx_opt = Some(ret_rx_res?);
    trace!("spawned namespace thread {} for {:?}", pid, hostname_str);

    Ok(JoinHandle {
        stack_ptr, child_tid, ret_rx_opt,
    })
}

extern "C" fn clone_cb<R: Send + 'static>(arg: *mut c_void) -> c_int {
    let res = panic::catch_unwind(panic::AssertUnwindSafe(move || {
        let data: *mut CbData<R> = arg as *mut _;
        let data: Box<CbData<R>> = unsafe { Box::from_raw(data) };
        let CbData { func, ret_rx_tx, hostname, uid, gid } = *data;

        // The clone()d thread does not have working thread-local storage (that would need
        // CLONE_SETTLS with whatever tls block std::thread would have set up). So only do the bare
        // minimum of setup here, then run `func` on a std thread spawned inside the namespace.
        // Until we're on that thread things like println! are not safe to call.

        let ret_tx = match setup_namespace(&hostname, uid, gid) {
            Ok(()) => {
                let (ret_tx, ret_rx) = oneshot::channel();
                let _ = ret_rx_tx.send(Ok(ret_rx));
                ret_tx
            },
            Err(err) => {
                let _ = ret_rx_tx.send(Err(err));
                return;
            },
        };

        let joiner = thread::spawn(move || {
            let ret = panic::catch_unwind(panic::AssertUnwindSafe(func));
            let _ = ret_tx.send(ret);
        });
        let _ = joiner.join();
    }));
    match res {
        Ok(()) => 0,
        Err(_err) => std::process::exit(1),
    }
}

fn setup_namespace(hostname: &CStr, uid: u32, gid: u32) -> io::Result<()> {
    let res = unsafe {
        #[cfg_attr(feature="cargo-clippy", allow(clippy::unnecessary_cast))]
        libc::prctl(libc::PR_SET_PDEATHSIG as i32, libc::SIGTERM, 0, 0, 0)
    };
    if res == -1 {
        return Err(io::Error::last_os_error());
    }

    write_proc_file("/proc/self/uid_map", &format!("0 {} 1\n", uid))?;
    write_proc_file("/proc/self/setgroups", "deny\n")?;
    write_proc_file("/proc/self/gid_map", &format!("0 {} 1\n", gid))?;

    let res = unsafe {
        libc::sethostname(hostname.as_ptr(), hostname.to_bytes().len())
    };
    if res == -1 {
        let err = io::Error::last_os_error();
        return Err(io::Error::new(err.kind(), "calling sethostname inside the namespace"));
    }

    Ok(())
}

fn write_proc_file(path: &str, contents: &str) -> io::Result<()> {
    let mut f = File::create(path)?;
    let n = f.write(contents.as_bytes())?;
    if n != contents.len() {
        let msg = format!("short write to {}", path);
        return Err(io::Error::new(io::ErrorKind::WriteZero, msg));
    }
    Ok(())
}

fn permission_denied_error(uid: u32, gid: u32) -> io::Error {
    let version = {
        let mut utsname = MaybeUninit::<libc::utsname>::uninit();
        let res = unsafe {
            libc::uname(utsname.as_mut_ptr())
        };
        if res == 0 {
            let utsname = unsafe { utsname.assume_init() };
            let release = unsafe { CStr::from_ptr(utsname.release.as_ptr()) };
            release.to_string_lossy().into_owned()
        } else {
            String::from("<unknown>")
        }
    };
    let user_name = unsafe {
        let passwd = libc::getpwuid(uid);
        if passwd.is_null() {
            uid.to_string()
        } else {
            CStr::from_ptr((*passwd).pw_name).to_string_lossy().into_owned()
        }
    };
    let group_name = unsafe {
        let group = libc::getgrgid(gid);
        if group.is_null() {
            gid.to_string()
        } else {
            CStr::from_ptr((*group).gr_name).to_string_lossy().into_owned()
        }
    };

    let msg = format!(
        "\
        Failed to call clone(CLONE_NEWUSER | CLONE_NEWNET) (permission denied). \
        Your kernel may be too old or may have unprivileged user namespaces disabled. \
        Version >= 3.8 is required, your version is {}. \
        Your user/group must also be valid (not nobody). \
        Your user == {}, group == {}. \
        You cannot run a lab network in a chroot.\
        ",
        version, user_name, group_name,
    );
    io::Error::new(io::ErrorKind::PermissionDenied, msg)
}
