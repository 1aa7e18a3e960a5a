/// A macro to create a new `ConvLayer<f32>` from its channel count and extents.
///
/// # Examples
///
/// ```
/// use convnd::activations::Activation;
/// use convnd::conv_layer;
/// use convnd::geometry::Rank;
///
/// let line = conv_layer!(1; 6);
/// let plane = conv_layer!(3; 8, 8; Activation::Relu);
/// assert_eq!(line.rank(), Rank::One);
/// assert_eq!(plane.len(), 64);
/// ```
///
/// The rank follows the number of extents given. Without an activation the
/// layer gets the canonical activation for its channel count.
#[macro_export]
macro_rules! conv_layer {
    (@build $channels:expr, $activation:expr; $($extent:expr),+) => {{
        let axes: &[usize] = &[$($extent),+];
        let mut extent = [1usize; $crate::geometry::MAX_RANK];
        for (slot, &len) in extent.iter_mut().zip(axes) {
            *slot = len;
        }
        let rank = $crate::geometry::Rank::from_axes(axes.len().min($crate::geometry::MAX_RANK))
            .unwrap_or_default();
        $crate::layers::ConvLayer::<f32>::new(
            $channels,
            rank,
            $crate::geometry::Extent::from_array(extent),
            $activation,
        )
    }};
    ($channels:expr; $($extent:expr),+ ; $activation:expr) => {
        $crate::conv_layer!(@build $channels, Some($activation); $($extent),+)
    };
    ($channels:expr; $($extent:expr),+) => {
        $crate::conv_layer!(
            @build $channels,
            Some($crate::activations::Activation::canonical($channels));
            $($extent),+
        )
    };
}

/// A macro to create a linked `ConvChain<f32>` from layers in order.
///
/// # Examples
///
/// ```
/// use convnd::{conv_chain, conv_layer};
///
/// let chain = conv_chain![conv_layer!(1; 4), conv_layer!(1; 2)];
/// assert_eq!(chain.order(), vec![0, 1]);
/// ```
#[macro_export]
macro_rules! conv_chain {
    ($($layer:expr),* $(,)?) => {{
        let mut chain = $crate::chain::ConvChain::<f32>::new();
        $( chain.push($layer); )*
        chain
    }};
}
