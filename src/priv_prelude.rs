pub(crate) use {
    std::{
        cmp, fmt, io, mem, panic, ptr, slice, thread,
        collections::{BTreeMap, HashMap, HashSet},
        ffi::{CStr, CString},
        fs::File,
        future::{Future, IntoFuture},
        io::Write,
        mem::MaybeUninit,
        net::Ipv4Addr,
        os::fd::{AsRawFd, FromRawFd, OwnedFd},
        path::{Path, PathBuf},
        pin::Pin,
        str::FromStr,
        sync::{Arc, Mutex, PoisonError},
        task::{self, Poll},
        time::{Duration, Instant, SystemTime, UNIX_EPOCH},
    },
    futures::{
        ready, FutureExt, Sink, SinkExt, Stream, StreamExt,
        channel::mpsc,
        stream::FusedStream,
    },
    tokio::io::{AsyncWrite, AsyncWriteExt, unix::AsyncFd},
    libc::{c_int, c_void, pid_t},
    log::{debug, info, log_enabled, trace, warn, Level},
    bytes::{BufMut, Bytes, BytesMut},
    pin_project::pin_project,
    quick_error::quick_error,
    net_literals::ipv4,
    routelab_macros::{ipv4_iface_addr, ipv4_network},
    crate::{
        capture::{CapturedFrame, PacketCapture, TapPoint, Tapped},
        device::{EtherChannel, EtherSinkStream, EtherSwitch},
        error::{NetworkError, TopologyError},
        frame::EtherFrame,
        iface::{self, EtherIface, EtherIfaceBuilder},
        ioctl,
        mac::MacAddr,
        machine::Machine,
        namespace,
        network::{Ipv4IfaceAddr, Ipv4Network},
        route::{Ipv4Route, RouteEntry, RoutingTable},
    },
};
