/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Copy a named boot image into memory.

use crate::io::{registry::IoContext, Entity, IoError, Result, Spec};

/// Load image `name` into the start of `dest`, returning its length.
///
/// The source is picked by the policy table. The image length comes from the device
/// when it can tell, otherwise from the extent the policy opens.
pub fn load_image(io: &mut IoContext<'_>, name: &str, dest: &mut [u8]) -> Result<usize> {
    let (handle, spec) = io.resolve_image_source(name)?;
    let entity = io.open(handle, &spec)?;
    let result = read_whole(io, &entity, &spec, dest);
    io.close(entity)?;
    match result {
        Ok(length) => {
            info!("Loaded {} ({:#x} bytes)", name, length);
            Ok(length)
        }
        Err(e) => {
            warn!("Failed to load {}: {}", name, e);
            Err(e)
        }
    }
}

fn read_whole(
    io: &mut IoContext<'_>,
    entity: &Entity,
    spec: &Spec,
    dest: &mut [u8],
) -> Result<usize> {
    let length = match (io.size(entity), spec) {
        (Ok(length), _) => length,
        (Err(IoError::NotSupported), Spec::Block(block)) => block.length,
        (Err(e), _) => return Err(e),
    };
    if length == 0 {
        return Err(IoError::Fail);
    }
    let target = dest.get_mut(..length).ok_or(IoError::OutOfBounds)?;
    io.read(entity, target)
}
