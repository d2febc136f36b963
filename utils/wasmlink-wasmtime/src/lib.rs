use anyhow::Context;
use wasmlink::{GuestContext, GuestVal};
use wasmtime::{AsContext, AsContextMut};

// === WslExportNames === //

/// Names of the guest exports the host relies on.
#[derive(Debug, Clone)]
pub struct WslExportNames {
    pub memory: &'static str,
    pub alloc: &'static str,
    pub free: &'static str,
    pub table: &'static str,
}

impl Default for WslExportNames {
    fn default() -> Self {
        Self {
            memory: "memory",
            alloc: "gpu_alloc",
            free: "gpu_free",
            table: "__indirect_function_table",
        }
    }
}

// === WslStoreState === //

pub type WslLinker<H> = wasmtime::Linker<WslStoreState<H>>;

/// Store data for a guest driven by host state `H`.
///
/// The host state is lent out to one entry point at a time through [`WslContext::with_host`].
pub struct WslStoreState<H> {
    host: Option<H>,
    exports: Option<WslExports>,
}

#[derive(Clone)]
struct WslExports {
    memory: wasmtime::Memory,
    alloc: wasmtime::TypedFunc<u32, u32>,
    free: wasmtime::TypedFunc<u32, ()>,
    table: wasmtime::Table,
}

impl<H> WslStoreState<H> {
    pub fn new(host: H) -> Self {
        Self {
            host: Some(host),
            exports: None,
        }
    }

    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    pub fn host_mut(&mut self) -> Option<&mut H> {
        self.host.as_mut()
    }
}

pub trait WslStoreExt<H> {
    fn setup_exports(
        &mut self,
        instance: wasmtime::Instance,
        names: &WslExportNames,
    ) -> anyhow::Result<()>;

    fn root<R>(
        &mut self,
        f: impl FnOnce(&mut H, &mut WslContext<'_, H>) -> anyhow::Result<R>,
    ) -> anyhow::Result<R>;
}

impl<H: 'static> WslStoreExt<H> for wasmtime::Store<WslStoreState<H>> {
    fn setup_exports(
        &mut self,
        instance: wasmtime::Instance,
        names: &WslExportNames,
    ) -> anyhow::Result<()> {
        let exports = WslExports {
            memory: instance
                .get_memory(&mut *self, names.memory)
                .context("failed to find guest memory export")?,
            alloc: instance
                .get_typed_func(&mut *self, names.alloc)
                .with_context(|| format!("failed to find {}", names.alloc))?,
            free: instance
                .get_typed_func(&mut *self, names.free)
                .with_context(|| format!("failed to find {}", names.free))?,
            table: instance
                .get_table(&mut *self, names.table)
                .with_context(|| format!("failed to find {}", names.table))?,
        };

        tracing::debug!(?names, "bound guest exports");

        self.data_mut().exports = Some(exports);

        Ok(())
    }

    fn root<R>(
        &mut self,
        f: impl FnOnce(&mut H, &mut WslContext<'_, H>) -> anyhow::Result<R>,
    ) -> anyhow::Result<R> {
        WslContext::new(WslContextInner::Root(self))?.with_host(f)
    }
}

// === WslContext === //

pub struct WslContext<'a, H: 'static> {
    inner: WslContextInner<'a, H>,
    exports: WslExports,
}

enum WslContextInner<'a, H: 'static> {
    Root(&'a mut wasmtime::Store<WslStoreState<H>>),
    Call(wasmtime::Caller<'a, WslStoreState<H>>),
}

impl<'a, H: 'static> WslContext<'a, H> {
    pub fn from_caller(caller: wasmtime::Caller<'a, WslStoreState<H>>) -> anyhow::Result<Self> {
        Self::new(WslContextInner::Call(caller))
    }

    fn new(inner: WslContextInner<'a, H>) -> anyhow::Result<Self> {
        let exports = match &inner {
            WslContextInner::Root(store) => store.data().exports.clone(),
            WslContextInner::Call(caller) => caller.data().exports.clone(),
        }
        .context("exports never initialized with `WslStoreExt::setup_exports`")?;

        Ok(Self { inner, exports })
    }

    fn cx(&self) -> wasmtime::StoreContext<'_, WslStoreState<H>> {
        match &self.inner {
            WslContextInner::Root(store) => store.as_context(),
            WslContextInner::Call(caller) => caller.as_context(),
        }
    }

    fn cx_mut(&mut self) -> wasmtime::StoreContextMut<'_, WslStoreState<H>> {
        match &mut self.inner {
            WslContextInner::Root(store) => store.as_context_mut(),
            WslContextInner::Call(caller) => caller.as_context_mut(),
        }
    }

    /// Lends the host state to `f` alongside a context for the guest. The state is returned to
    /// the store afterwards, even if `f` unwinds.
    pub fn with_host<R>(
        mut self,
        f: impl FnOnce(&mut H, &mut Self) -> anyhow::Result<R>,
    ) -> anyhow::Result<R> {
        let host = self
            .cx_mut()
            .data_mut()
            .host
            .take()
            .context("host state is already lent out")?;

        let mut guard = scopeguard::guard((self, host), |(mut me, host)| {
            me.cx_mut().data_mut().host = Some(host);
        });

        let (me, host) = &mut *guard;
        f(host, me)
    }
}

impl<H: 'static> GuestContext for WslContext<'_, H> {
    fn guest_memory(&self) -> &[u8] {
        self.exports.memory.data(self.cx())
    }

    fn guest_memory_mut(&mut self) -> &mut [u8] {
        let memory = self.exports.memory;
        memory.data_mut(self.cx_mut())
    }

    fn alloc(&mut self, size: u32) -> anyhow::Result<u32> {
        let alloc = self.exports.alloc.clone();
        alloc
            .call(self.cx_mut(), size)
            .with_context(|| format!("failed to allocate {size} byte(s) on guest"))
    }

    fn free(&mut self, addr: u32) -> anyhow::Result<()> {
        let free = self.exports.free.clone();
        free.call(self.cx_mut(), addr)
            .with_context(|| format!("failed to free guest allocation at {addr:#x}"))
    }

    fn invoke(&mut self, func: u32, args: &[GuestVal]) -> anyhow::Result<()> {
        let table = self.exports.table;
        let callee = table
            .get(self.cx_mut(), u64::from(func))
            .with_context(|| format!("function table index {func} is out of bounds"))?
            .as_func()
            .flatten()
            .cloned()
            .with_context(|| format!("function table entry {func} is not a function"))?;

        let params = args
            .iter()
            .map(|arg| match *arg {
                GuestVal::I32(v) => wasmtime::Val::I32(v),
                GuestVal::I64(v) => wasmtime::Val::I64(v),
                GuestVal::F32(v) => wasmtime::Val::F32(v.to_bits()),
                GuestVal::F64(v) => wasmtime::Val::F64(v.to_bits()),
            })
            .collect::<Vec<_>>();

        callee
            .call(self.cx_mut(), &params, &mut [])
            .with_context(|| format!("guest callback {func} failed"))
    }
}

// === Function Definitions === //

/// Runs an entry point body with the host state and a guest context for `caller`.
pub fn with_caller<H: 'static, R>(
    caller: wasmtime::Caller<'_, WslStoreState<H>>,
    f: impl FnOnce(&mut H, &mut dyn GuestContext) -> anyhow::Result<R>,
) -> anyhow::Result<R> {
    WslContext::from_caller(caller)?.with_host(|host, cx| f(host, cx))
}
