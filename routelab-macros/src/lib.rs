use {
    std::{
        net::Ipv4Addr,
        str::FromStr,
    },
    proc_macro::TokenStream,
    quote::quote_spanned,
};

/// Creates an `Ipv4Network` given an address range in CIDR notation. Host bits are cleared, so
/// `"10.0.1.7/24"` names the same network as `"10.0.1.0/24"`.
///
/// # Example
///
/// ```rust,ignore
/// assert_eq!(Ipv4Network::new(ipv4!("10.0.4.0"), 24), ipv4_network!("10.0.4.0/24"));
/// ```
#[proc_macro]
pub fn ipv4_network(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::LitStr);
    let span = input.span();
    let s = input.value();
    let output = match parse_cidr(&s) {
        Ok((addr, subnet_mask_bits)) => {
            let [b0, b1, b2, b3] = addr.octets();
            quote_spanned!(span=> {
                ::routelab::Ipv4Network::new(::std::net::Ipv4Addr::new(#b0, #b1, #b2, #b3), #subnet_mask_bits)
            })
        },
        Err(err) => {
            quote_spanned!(span=> {
                compile_error!(#err)
            })
        },
    };
    output.into()
}

/// Creates an `Ipv4IfaceAddr`, an interface address together with the length of its subnet
/// mask, written the way `ip addr add` takes it.
///
/// # Example
///
/// ```rust,ignore
/// let addr = ipv4_iface_addr!("10.0.1.2/24");
/// assert_eq!(addr.network(), ipv4_network!("10.0.1.0/24"));
/// ```
#[proc_macro]
pub fn ipv4_iface_addr(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::LitStr);
    let span = input.span();
    let s = input.value();
    let output = match parse_cidr(&s) {
        Ok((addr, subnet_mask_bits)) => {
            let [b0, b1, b2, b3] = addr.octets();
            quote_spanned!(span=> {
                ::routelab::Ipv4IfaceAddr::new(::std::net::Ipv4Addr::new(#b0, #b1, #b2, #b3), #subnet_mask_bits)
            })
        },
        Err(err) => {
            quote_spanned!(span=> {
                compile_error!(#err)
            })
        },
    };
    output.into()
}

fn parse_cidr(s: &str) -> Result<(Ipv4Addr, u8), String> {
    let (addr, subnet_mask_bits) = match s.split_once('/') {
        None => return Err(String::from("missing '/' character")),
        Some((addr, subnet_mask_bits)) => (addr, subnet_mask_bits),
    };
    let addr = match Ipv4Addr::from_str(addr) {
        Err(err) => return Err(err.to_string()),
        Ok(addr) => addr,
    };
    let subnet_mask_bits = match u8::from_str(subnet_mask_bits) {
        Err(err) => return Err(err.to_string()),
        Ok(subnet_mask_bits) => subnet_mask_bits,
    };
    if subnet_mask_bits > 32 {
        return Err(String::from("subnet mask bits cannot be greater than 32"));
    }
    Ok((addr, subnet_mask_bits))
}
