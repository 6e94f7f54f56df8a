#![allow(clippy::upper_case_acronyms)]
#![allow(dead_code)]
use crate::backend::BackendNode;
use crate::context::RPCContext;
use crate::handle::FileHandle;
use crate::nfs;
use crate::nfs::{FSF_CANSETTIME, FSF_HOMOGENEOUS, FSF_LINK};
use crate::rpc::*;
use crate::xdr::*;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::cast::FromPrimitive;
use std::io::{Read, Write};
use tracing::{debug, error, warn};
/*
program NFS_PROGRAM {
 version NFS_V3 {

    void
     NFSPROC3_NULL(void)                    = 0;

    GETATTR3res
     NFSPROC3_GETATTR(GETATTR3args)         = 1;

    SETATTR3res
     NFSPROC3_SETATTR(SETATTR3args)         = 2;

    LOOKUP3res
     NFSPROC3_LOOKUP(LOOKUP3args)           = 3;

    ACCESS3res
     NFSPROC3_ACCESS(ACCESS3args)           = 4;

    READLINK3res
     NFSPROC3_READLINK(READLINK3args)       = 5;

    READ3res
     NFSPROC3_READ(READ3args)               = 6;

    WRITE3res
     NFSPROC3_WRITE(WRITE3args)             = 7;

    CREATE3res
     NFSPROC3_CREATE(CREATE3args)           = 8;

    MKDIR3res
     NFSPROC3_MKDIR(MKDIR3args)             = 9;

    SYMLINK3res
     NFSPROC3_SYMLINK(SYMLINK3args)         = 10;

    MKNOD3res
     NFSPROC3_MKNOD(MKNOD3args)             = 11;

    REMOVE3res
     NFSPROC3_REMOVE(REMOVE3args)           = 12;

    RMDIR3res
     NFSPROC3_RMDIR(RMDIR3args)             = 13;

    RENAME3res
     NFSPROC3_RENAME(RENAME3args)           = 14;

    LINK3res
     NFSPROC3_LINK(LINK3args)               = 15;

    READDIR3res
     NFSPROC3_READDIR(READDIR3args)         = 16;

    READDIRPLUS3res
     NFSPROC3_READDIRPLUS(READDIRPLUS3args) = 17;

    FSSTAT3res
     NFSPROC3_FSSTAT(FSSTAT3args)           = 18;

    FSINFO3res
     NFSPROC3_FSINFO(FSINFO3args)           = 19;

    PATHCONF3res
     NFSPROC3_PATHCONF(PATHCONF3args)       = 20;

    COMMIT3res
     NFSPROC3_COMMIT(COMMIT3args)           = 21;

 } = 3;
} = 100003;
*/

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
enum NFSProgram {
    NFSPROC3_NULL = 0,
    NFSPROC3_GETATTR = 1,
    NFSPROC3_SETATTR = 2,
    NFSPROC3_LOOKUP = 3,
    NFSPROC3_ACCESS = 4,
    NFSPROC3_READLINK = 5,
    NFSPROC3_READ = 6,
    NFSPROC3_WRITE = 7,
    NFSPROC3_CREATE = 8,
    NFSPROC3_MKDIR = 9,
    NFSPROC3_SYMLINK = 10,
    NFSPROC3_MKNOD = 11,
    NFSPROC3_REMOVE = 12,
    NFSPROC3_RMDIR = 13,
    NFSPROC3_RENAME = 14,
    NFSPROC3_LINK = 15,
    NFSPROC3_READDIR = 16,
    NFSPROC3_READDIRPLUS = 17,
    NFSPROC3_FSSTAT = 18,
    NFSPROC3_FSINFO = 19,
    NFSPROC3_PATHCONF = 20,
    NFSPROC3_COMMIT = 21,
    INVALID = 22,
}

pub async fn handle_nfs(
    xid: u32,
    call: call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    if call.vers != nfs::VERSION {
        warn!(
            "Invalid NFS Version number {} != {}",
            call.vers,
            nfs::VERSION
        );
        prog_mismatch_reply_message(xid, nfs::VERSION).serialize(output)?;
        return Ok(());
    }
    let prog = NFSProgram::from_u32(call.proc).unwrap_or(NFSProgram::INVALID);

    match prog {
        NFSProgram::NFSPROC3_NULL => nfsproc3_null(xid, input, output)?,
        NFSProgram::NFSPROC3_GETATTR => nfsproc3_getattr(xid, input, output, context)?,
        NFSProgram::NFSPROC3_SETATTR => nfsproc3_setattr(xid, input, output, context)?,
        NFSProgram::NFSPROC3_LOOKUP => nfsproc3_lookup(xid, input, output, context)?,
        NFSProgram::NFSPROC3_ACCESS => nfsproc3_access(xid, input, output, context)?,
        NFSProgram::NFSPROC3_READ => nfsproc3_read(xid, input, output, context)?,
        NFSProgram::NFSPROC3_WRITE => nfsproc3_write(xid, input, output, context)?,
        NFSProgram::NFSPROC3_CREATE => nfsproc3_create(xid, input, output, context)?,
        NFSProgram::NFSPROC3_MKDIR => nfsproc3_mkdir(xid, input, output, context)?,
        NFSProgram::NFSPROC3_REMOVE => nfsproc3_remove(xid, input, output, context)?,
        NFSProgram::NFSPROC3_RMDIR => nfsproc3_rmdir(xid, input, output, context)?,
        NFSProgram::NFSPROC3_RENAME => nfsproc3_rename(xid, input, output, context)?,
        NFSProgram::NFSPROC3_LINK => nfsproc3_link(xid, input, output, context)?,
        NFSProgram::NFSPROC3_READDIRPLUS => nfsproc3_readdirplus(xid, input, output, context)?,
        NFSProgram::NFSPROC3_FSSTAT => nfsproc3_fsstat(xid, input, output, context)?,
        NFSProgram::NFSPROC3_FSINFO => nfsproc3_fsinfo(xid, input, output, context)?,
        NFSProgram::NFSPROC3_PATHCONF => nfsproc3_pathconf(xid, input, output, context)?,
        NFSProgram::NFSPROC3_COMMIT => nfsproc3_commit(xid, input, output, context)?,
        _ => {
            warn!("Unimplemented message {:?}", prog);
            proc_unavail_reply_message(xid).serialize(output)?;
        } /*
          NFSPROC3_READLINK, NFSPROC3_SYMLINK, NFSPROC3_MKNOD, NFSPROC3_READDIR:
          symlinks/devices/the non-plus READDIR variant are out of scope.
          */
    }
    Ok(())
}

/// Resolves a wire handle via the mux. A handle that fails to parse (wrong
/// length) or that isn't bound is indistinguishable to the client from a
/// handle that used to be valid and was unbound: both come back `STALE`.
fn resolve(context: &RPCContext, fh: &nfs::nfs_fh3) -> Result<BackendNode, nfs::nfsstat3> {
    let handle = FileHandle::from_bytes(&fh.data).ok_or(nfs::nfsstat3::NFS3ERR_STALE)?;
    context
        .mux
        .load(handle)
        .ok_or(nfs::nfsstat3::NFS3ERR_STALE)
}

fn attr_opt(node: &BackendNode) -> nfs::post_op_attr {
    nfs::post_op_attr::attributes(node.attr())
}

fn wcc_attr_of(node: &BackendNode) -> nfs::wcc_attr {
    let a = node.attr();
    nfs::wcc_attr {
        size: a.size,
        mtime: a.mtime,
        ctime: a.ctime,
    }
}

pub fn nfsproc3_null(
    xid: u32,
    _: &mut impl Read,
    output: &mut impl Write,
) -> Result<(), anyhow::Error> {
    debug!("nfsproc3_null({:?}) ", xid);
    let msg = make_success_reply(xid);
    debug!("\t{:?} --> {:?}", xid, msg);
    msg.serialize(output)?;
    Ok(())
}
/*
GETATTR3res NFSPROC3_GETATTR(GETATTR3args) = 1;
struct GETATTR3args {
  nfs_fh3  object;
};

struct GETATTR3resok {
  fattr3   obj_attributes;
};

union GETATTR3res switch (nfsstat3 status) {
 case NFS3_OK:
  GETATTR3resok  resok;
 default:
  void;
};
 */
pub fn nfsproc3_getattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut handle = nfs::nfs_fh3::default();
    handle.deserialize(input)?;
    debug!("nfsproc3_getattr({:?},{:?}) ", xid, handle);

    match resolve(context, &handle) {
        Ok(node) => {
            let attr = node.attr();
            debug!(" {:?} --> {:?}", xid, attr);
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3_OK.serialize(output)?;
            attr.serialize(output)?;
        }
        Err(stat) => {
            error!("getattr error {:?} --> {:?}", xid, stat);
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    Ok(())
}

/*
 LOOKUP3res NFSPROC3_LOOKUP(LOOKUP3args) = 3;

 struct LOOKUP3args {
      diropargs3  what;
 };

 struct LOOKUP3resok {
      nfs_fh3      object;
      post_op_attr obj_attributes;
      post_op_attr dir_attributes;
 };

 struct LOOKUP3resfail {
      post_op_attr dir_attributes;
 };

 union LOOKUP3res switch (nfsstat3 status) {
 case NFS3_OK:
      LOOKUP3resok    resok;
 default:
      LOOKUP3resfail  resfail;
 };
*
*/
pub fn nfsproc3_lookup(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut dirops = nfs::diropargs3::default();
    dirops.deserialize(input)?;
    debug!("nfsproc3_lookup({:?},{:?}) ", xid, dirops);

    let dirnode = match resolve(context, &dirops.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };
    let dir_attr = attr_opt(&dirnode);
    let dir = match dirnode.as_dir() {
        Some(d) => d,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            dir_attr.serialize(output)?;
            return Ok(());
        }
    };

    match dir.lookup(&dirops.name) {
        Ok(child_handle) => {
            // The dirent's handle can outlive its mux binding: a LINK
            // followed by a REMOVE of the original name unbinds the shared
            // handle unconditionally (per the mux's "no reference counting"
            // contract) while the dirent still points at it. That's a live
            // STALE, not a bug, so report it rather than unwrapping.
            let child = match context.mux.load(child_handle) {
                Some(c) => c,
                None => {
                    debug!("lookup stale {:?}({:?})", xid, dirops.name);
                    make_success_reply(xid).serialize(output)?;
                    nfs::nfsstat3::NFS3ERR_STALE.serialize(output)?;
                    dir_attr.serialize(output)?;
                    return Ok(());
                }
            };
            let obj_attr = attr_opt(&child);
            debug!("lookup success {:?} --> {:?}", xid, obj_attr);
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3_OK.serialize(output)?;
            child_handle.to_fh3().serialize(output)?;
            obj_attr.serialize(output)?;
            dir_attr.serialize(output)?;
        }
        Err(stat) => {
            debug!("lookup error {:?}({:?}) --> {:?}", xid, dirops.name, stat);
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct READ3args {
    file: nfs::nfs_fh3,
    offset: nfs::offset3,
    count: nfs::count3,
}
XDRStruct!(READ3args, file, offset, count);

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct READ3resok {
    file_attributes: nfs::post_op_attr,
    count: nfs::count3,
    eof: bool,
    data: Vec<u8>,
}
XDRStruct!(READ3resok, file_attributes, count, eof, data);
/*
READ3res NFSPROC3_READ(READ3args) = 6;

struct READ3args {
   nfs_fh3  file;
   offset3  offset;
   count3   count;
};

struct READ3resok {
   post_op_attr   file_attributes;
   count3         count;
   bool           eof;
   opaque         data<>;
};

struct READ3resfail {
   post_op_attr   file_attributes;
};

union READ3res switch (nfsstat3 status) {
case NFS3_OK:
   READ3resok   resok;
default:
   READ3resfail resfail;
};
 */
pub fn nfsproc3_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut args = READ3args::default();
    args.deserialize(input)?;
    debug!("nfsproc3_read({:?},{:?}) ", xid, args);

    let node = match resolve(context, &args.file) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };
    let obj_attr = attr_opt(&node);
    let file = match node.as_file() {
        Some(f) => f,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            obj_attr.serialize(output)?;
            return Ok(());
        }
    };

    let (data, eof) = file.read(args.offset, args.count);
    let res = READ3resok {
        file_attributes: obj_attr,
        count: data.len() as u32,
        eof,
        data,
    };
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}

/*

  FSINFO3res NFSPROC3_FSINFO(FSINFO3args) = 19;

  const FSF3_LINK        = 0x0001;
  const FSF3_SYMLINK     = 0x0002;
  const FSF3_HOMOGENEOUS = 0x0008;
  const FSF3_CANSETTIME  = 0x0010;

  struct FSINFOargs {
       nfs_fh3   fsroot;
  };

  struct FSINFO3resok {
       post_op_attr obj_attributes;
       uint32       rtmax;
       uint32       rtpref;
       uint32       rtmult;
       uint32       wtmax;
       uint32       wtpref;
       uint32       wtmult;
       uint32       dtpref;
       size3        maxfilesize;
       nfstime3     time_delta;
       uint32       properties;
  };

  struct FSINFO3resfail {
       post_op_attr obj_attributes;
  };

  union FSINFO3res switch (nfsstat3 status) {
  case NFS3_OK:
       FSINFO3resok   resok;
  default:
       FSINFO3resfail resfail;
  };
*/

/// FSINFO requires fs-root capability: the handle must resolve to the
/// root directory, not merely any directory.
pub fn nfsproc3_fsinfo(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut handle = nfs::nfs_fh3::default();
    handle.deserialize(input)?;
    debug!("nfsproc3_fsinfo({:?},{:?}) ", xid, handle);

    let node = match resolve(context, &handle) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };
    let obj_attr = attr_opt(&node);
    let is_fsroot = node.as_dir().map(|d| d.is_root()).unwrap_or(false);
    if !is_fsroot {
        make_success_reply(xid).serialize(output)?;
        nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
        obj_attr.serialize(output)?;
        return Ok(());
    }

    let res = nfs::fsinfo3 {
        obj_attributes: obj_attr,
        rtmax: 1024 * 1024,
        rtpref: 1024 * 1024,
        rtmult: 4096,
        wtmax: 1024 * 1024,
        wtpref: 1024 * 1024,
        wtmult: 4096,
        dtpref: 32 * 1024,
        maxfilesize: 17_592_186_044_416, // ~17.6 TB, matches the 2^44 wire budget
        time_delta: nfs::nfstime3 {
            seconds: 1,
            nseconds: 0,
        },
        properties: FSF_LINK | FSF_HOMOGENEOUS | FSF_CANSETTIME,
    };

    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    debug!(" {:?} ---> {:?}", xid, res);
    res.serialize(output)?;
    Ok(())
}

const ACCESS3_READ: u32 = 0x0001;
const ACCESS3_LOOKUP: u32 = 0x0002;
const ACCESS3_MODIFY: u32 = 0x0004;
const ACCESS3_EXTEND: u32 = 0x0008;
const ACCESS3_DELETE: u32 = 0x0010;
const ACCESS3_EXECUTE: u32 = 0x0020;
/*

 ACCESS3res NFSPROC3_ACCESS(ACCESS3args) = 4;


 struct ACCESS3args {
      nfs_fh3  object;
      uint32   access;
 };

 struct ACCESS3resok {
      post_op_attr   obj_attributes;
      uint32         access;
 };

 struct ACCESS3resfail {
      post_op_attr   obj_attributes;
 };

 union ACCESS3res switch (nfsstat3 status) {
 case NFS3_OK:
      ACCESS3resok   resok;
 default:
      ACCESS3resfail resfail;
 };
*/

pub fn nfsproc3_access(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut handle = nfs::nfs_fh3::default();
    handle.deserialize(input)?;
    let mut access: u32 = 0;
    access.deserialize(input)?;
    debug!("nfsproc3_access({:?},{:?},{:?})", xid, handle, access);

    let node = match resolve(context, &handle) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };
    let obj_attr = attr_opt(&node);
    let granted = match &node {
        BackendNode::Dir(d) => d.access(access),
        BackendNode::File(f) => f.access(access),
    };
    debug!(" {:?} ---> {:?}", xid, granted);
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    obj_attr.serialize(output)?;
    granted.serialize(output)?;
    Ok(())
}

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct PATHCONF3resok {
    obj_attributes: nfs::post_op_attr,
    linkmax: u32,
    name_max: u32,
    no_trunc: bool,
    chown_restricted: bool,
    case_insensitive: bool,
    case_preserving: bool,
}
XDRStruct!(
    PATHCONF3resok,
    obj_attributes,
    linkmax,
    name_max,
    no_trunc,
    chown_restricted,
    case_insensitive,
    case_preserving
);
/*

     PATHCONF3res NFSPROC3_PATHCONF(PATHCONF3args) = 20;

     struct PATHCONF3args {
          nfs_fh3   object;
     };

     struct PATHCONF3resok {
          post_op_attr obj_attributes;
          uint32       linkmax;
          uint32       name_max;
          bool         no_trunc;
          bool         chown_restricted;
          bool         case_insensitive;
          bool         case_preserving;
     };

     struct PATHCONF3resfail {
          post_op_attr obj_attributes;
     };

     union PATHCONF3res switch (nfsstat3 status) {
     case NFS3_OK:
          PATHCONF3resok   resok;
     default:
          PATHCONF3resfail resfail;
     };
*/
pub fn nfsproc3_pathconf(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut handle = nfs::nfs_fh3::default();
    handle.deserialize(input)?;
    debug!("nfsproc3_pathconf({:?},{:?})", xid, handle);

    let node = match resolve(context, &handle) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };
    let obj_attr = attr_opt(&node);
    let res = PATHCONF3resok {
        obj_attributes: obj_attr,
        linkmax: 0,
        name_max: 0,
        no_trunc: false,
        chown_restricted: false,
        case_insensitive: false,
        case_preserving: false,
    };
    debug!(" {:?} ---> {:?}", xid, res);
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct FSSTAT3resok {
    obj_attributes: nfs::post_op_attr,
    tbytes: nfs::size3,
    fbytes: nfs::size3,
    abytes: nfs::size3,
    tfiles: nfs::size3,
    ffiles: nfs::size3,
    afiles: nfs::size3,
    invarsec: u32,
}
XDRStruct!(
    FSSTAT3resok,
    obj_attributes,
    tbytes,
    fbytes,
    abytes,
    tfiles,
    ffiles,
    afiles,
    invarsec
);

/*
 FSSTAT3res NFSPROC3_FSSTAT(FSSTAT3args) = 18;

     struct FSSTAT3args {
          nfs_fh3   fsroot;
     };

     struct FSSTAT3resok {
          post_op_attr obj_attributes;
          size3        tbytes;
          size3        fbytes;
          size3        abytes;
          size3        tfiles;
          size3        ffiles;
          size3        afiles;
          uint32       invarsec;
     };

     struct FSSTAT3resfail {
          post_op_attr obj_attributes;
     };

     union FSSTAT3res switch (nfsstat3 status) {
     case NFS3_OK:
          FSSTAT3resok   resok;
     default:
          FSSTAT3resfail resfail;
     };

*/
const PEBIBYTE: u64 = 1024 * 1024 * 1024 * 1024 * 1024;

pub fn nfsproc3_fsstat(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut handle = nfs::nfs_fh3::default();
    handle.deserialize(input)?;
    debug!("nfsproc3_fsstat({:?},{:?}) ", xid, handle);

    let node = match resolve(context, &handle) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };
    let obj_attr = attr_opt(&node);
    let is_fsroot = node.as_dir().map(|d| d.is_root()).unwrap_or(false);
    if !is_fsroot {
        make_success_reply(xid).serialize(output)?;
        nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
        obj_attr.serialize(output)?;
        return Ok(());
    }

    let res = FSSTAT3resok {
        obj_attributes: obj_attr,
        tbytes: PEBIBYTE,
        fbytes: PEBIBYTE / 2,
        abytes: PEBIBYTE / 2,
        tfiles: 1024,
        ffiles: 512,
        afiles: 512,
        invarsec: 0,
    };
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    debug!(" {:?} ---> {:?}", xid, res);
    res.serialize(output)?;
    Ok(())
}

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct READDIRPLUS3args {
    dir: nfs::nfs_fh3,
    cookie: nfs::cookie3,
    cookieverf: nfs::cookieverf3,
    dircount: nfs::count3,
    maxcount: nfs::count3,
}
XDRStruct!(
    READDIRPLUS3args,
    dir,
    cookie,
    cookieverf,
    dircount,
    maxcount
);

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct entryplus3 {
    fileid: nfs::fileid3,
    name: nfs::filename3,
    cookie: nfs::cookie3,
    name_attributes: nfs::post_op_attr,
    name_handle: nfs::post_op_fh3,
}
XDRStruct!(
    entryplus3,
    fileid,
    name,
    cookie,
    name_attributes,
    name_handle
);
/*

      READDIRPLUS3res NFSPROC3_READDIRPLUS(READDIRPLUS3args) = 17;

      struct READDIRPLUS3args {
           nfs_fh3      dir;
           cookie3      cookie;
           cookieverf3  cookieverf;
           count3       dircount;
           count3       maxcount;
      };


      struct dirlistplus3 {
           entryplus3   *entries;
           bool         eof;
      };

      struct READDIRPLUS3resok {
           post_op_attr dir_attributes;
           cookieverf3  cookieverf;
           dirlistplus3 reply;
      };
   struct READDIRPLUS3resfail {
           post_op_attr dir_attributes;
      };
*/
/// Does not honour the inbound cookie: every call walks the directory's
/// insertion-ordered children from the start and reports the same
/// (up-to-limit) prefix. Cookies are 1-based positions within that walk.
pub fn nfsproc3_readdirplus(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut args = READDIRPLUS3args::default();
    args.deserialize(input)?;
    debug!("nfsproc3_readdirplus({:?},{:?}) ", xid, args);

    let dirnode = match resolve(context, &args.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };
    let dir_attr = attr_opt(&dirnode);
    let dir = match dirnode.as_dir() {
        Some(d) => d,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            dir_attr.serialize(output)?;
            return Ok(());
        }
    };

    let entries = dir.readdirplus_entries(&context.mux);
    // size_of(Entryplus3) doesn't have a clean Rust equivalent (names are
    // variable length); use dircount as a proxy the same way maxcount
    // bounds total bytes, matching the reference's rough accounting.
    let max_by_maxcount = (args.maxcount as usize / 128).max(1);
    let max_by_dircount = (args.dircount as usize / 16).max(1);
    let limit = max_by_maxcount.min(max_by_dircount);

    let mut cookie: u64 = 0;
    let mut out_entries = Vec::new();
    for (name, node) in entries.iter() {
        cookie += 1;
        if out_entries.len() >= limit {
            break;
        }
        out_entries.push(entryplus3 {
            fileid: cookie,
            name: name.clone().into(),
            cookie,
            name_attributes: attr_opt(node),
            name_handle: nfs::post_op_fh3::handle(node.id().to_fh3()),
        });
    }
    let eof = out_entries.len() as u64 >= cookie;

    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    dir_attr.serialize(output)?;
    let cookieverf: nfs::cookieverf3 = cookie.to_be_bytes();
    cookieverf.serialize(output)?;
    for entry in &out_entries {
        true.serialize(output)?;
        entry.serialize(output)?;
    }
    false.serialize(output)?;
    eof.serialize(output)?;
    debug!(
        "readdirplus {:?}, flushing {} entries, eof {}",
        xid,
        out_entries.len(),
        eof
    );
    Ok(())
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how {
    #[default]
    UNSTABLE = 0,
    DATA_SYNC = 1,
    FILE_SYNC = 2,
}
XDREnumSerde!(stable_how);

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct WRITE3args {
    file: nfs::nfs_fh3,
    offset: nfs::offset3,
    count: nfs::count3,
    stable: u32,
    data: Vec<u8>,
}
XDRStruct!(WRITE3args, file, offset, count, stable, data);

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct WRITE3resok {
    file_wcc: nfs::wcc_data,
    count: nfs::count3,
    committed: stable_how,
    verf: nfs::writeverf3,
}
XDRStruct!(WRITE3resok, file_wcc, count, committed, verf);
/*
enum stable_how {
    UNSTABLE = 0,
    DATA_SYNC = 1,
    FILE_SYNC = 2
};


struct WRITE3args {
    nfs_fh3 file;
    offset3 offset;
    count3 count;
    stable_how stable;
    opaque data<>;
};

struct WRITE3resok {
    wcc_data file_wcc;
    count3 count;
    stable_how committed;
    writeverf3 verf;
};


struct WRITE3resfail {
    wcc_data file_wcc;
};


union WRITE3res switch (nfsstat3 status) {
    case NFS3_OK:
        WRITE3resok resok;
    default:
        WRITE3resfail resfail;
};

 */
/// Always replies with stability FILE_SYNC: the backend is memory-only so
/// there is no weaker durability tier to distinguish.
pub fn nfsproc3_write(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut args = WRITE3args::default();
    args.deserialize(input)?;
    debug!("nfsproc3_write({:?}, offset={}, count={}) ", xid, args.offset, args.count);
    if args.data.len() != args.count as usize {
        garbage_args_reply_message(xid).serialize(output)?;
        return Ok(());
    }

    let node = match resolve(context, &args.file) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&node));
    let file = match node.as_file() {
        Some(f) => f,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let written = file.write(args.offset, &args.data);
    let res = WRITE3resok {
        file_wcc: nfs::wcc_data {
            before: pre_attr,
            after: nfs::post_op_attr::attributes(file.getattr()),
        },
        count: written,
        committed: stable_how::FILE_SYNC,
        verf: [0u8; 8],
    };
    debug!("write success {:?} --> {:?}", xid, res);
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum createmode3 {
    #[default]
    UNCHECKED = 0,
    GUARDED = 1,
    EXCLUSIVE = 2,
}
XDREnumSerde!(createmode3);
/*
CREATE3res NFSPROC3_CREATE(CREATE3args) = 8;

      enum createmode3 {
           UNCHECKED = 0,
           GUARDED   = 1,
           EXCLUSIVE = 2
      };

      union createhow3 switch (createmode3 mode) {
      case UNCHECKED:
      case GUARDED:
           sattr3       obj_attributes;
      case EXCLUSIVE:
           createverf3  verf;
      };

      struct CREATE3args {
           diropargs3   where;
           createhow3   how;
      };

      struct CREATE3resok {
           post_op_fh3   obj;
           post_op_attr  obj_attributes;
           wcc_data      dir_wcc;
      };

      struct CREATE3resfail {
           wcc_data      dir_wcc;
      };

      union CREATE3res switch (nfsstat3 status) {
      case NFS3_OK:
           CREATE3resok    resok;
      default:
           CREATE3resfail  resfail;
      };
*/

pub fn nfsproc3_create(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut dirops = nfs::diropargs3::default();
    dirops.deserialize(input)?;
    let mut createhow = createmode3::default();
    createhow.deserialize(input)?;
    // UNCHECKED/GUARDED carry a sattr3; EXCLUSIVE carries a createverf3.
    // The reference backend doesn't honour either payload's contents
    // beyond distinguishing the three modes, but we must still consume
    // the right number of bytes to keep the stream aligned.
    let mut verf = nfs::createverf3::default();
    if matches!(createhow, createmode3::EXCLUSIVE) {
        input.read_exact(&mut verf)?;
    } else {
        let mut target_attributes = nfs::sattr3::default();
        target_attributes.deserialize(input)?;
    }

    debug!("nfsproc3_create({:?}, {:?}, {:?}) ", xid, dirops, createhow);

    let dirnode = match resolve(context, &dirops.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_dir_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&dirnode));
    let dir = match dirnode.as_dir() {
        Some(d) => d,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let guard_must_not_exist = matches!(createhow, createmode3::GUARDED);
    let result = dir.create(&context.mux, dirops.name.to_vec(), guard_must_not_exist);

    let post_dir_attr = nfs::post_op_attr::attributes(dir.getattr());
    let wcc_res = nfs::wcc_data {
        before: pre_dir_attr,
        after: post_dir_attr,
    };

    match result {
        Ok(node) => {
            debug!("create success --> {:?}", node.id());
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3_OK.serialize(output)?;
            nfs::post_op_fh3::handle(node.id().to_fh3()).serialize(output)?;
            attr_opt(&node).serialize(output)?;
            wcc_res.serialize(output)?;
        }
        Err(e) => {
            error!("create error --> {:?}", e);
            make_success_reply(xid).serialize(output)?;
            e.serialize(output)?;
            wcc_res.serialize(output)?;
        }
    }

    Ok(())
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum sattrguard3 {
    #[default]
    Void,
    obj_ctime(nfs::nfstime3),
}
XDRBoolUnion!(sattrguard3, obj_ctime, nfs::nfstime3);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
struct SETATTR3args {
    object: nfs::nfs_fh3,
    new_attribute: nfs::sattr3,
    guard: sattrguard3,
}
XDRStruct!(SETATTR3args, object, new_attribute, guard);

/*
    SETATTR3res NFSPROC3_SETATTR(SETATTR3args) = 2;

      union sattrguard3 switch (bool check) {
      case TRUE:
         nfstime3  obj_ctime;
      case FALSE:
         void;
      };

      struct SETATTR3args {
         nfs_fh3      object;
         sattr3       new_attributes;
         sattrguard3  guard;
      };

      struct SETATTR3resok {
         wcc_data  obj_wcc;
      };

      struct SETATTR3resfail {
         wcc_data  obj_wcc;
      };
      union SETATTR3res switch (nfsstat3 status) {
      case NFS3_OK:
         SETATTR3resok   resok;
      default:
         SETATTR3resfail resfail;
      };
*/
/// For directories this is always a no-op success; for files a present
/// `size` truncates or extends the backing buffer, other fields are
/// accepted without effect.
pub fn nfsproc3_setattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut args = SETATTR3args::default();
    args.deserialize(input)?;
    debug!("nfsproc3_setattr({:?},{:?}) ", xid, args);

    let node = match resolve(context, &args.object) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let ctime = node.attr().ctime;
    let pre_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&node));

    if let sattrguard3::obj_ctime(c) = args.guard {
        if c.seconds != ctime.seconds || c.nseconds != ctime.nseconds {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_NOT_SYNC.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    }

    let post_attr = match &node {
        BackendNode::Dir(d) => d.setattr(&args.new_attribute),
        BackendNode::File(f) => f.setattr(&args.new_attribute),
    };
    let wcc_res = nfs::wcc_data {
        before: pre_attr,
        after: nfs::post_op_attr::attributes(post_attr),
    };
    debug!(" setattr success {:?} --> {:?}", xid, wcc_res);
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    wcc_res.serialize(output)?;
    Ok(())
}

/*
      REMOVE3res NFSPROC3_REMOVE(REMOVE3args) = 12;

      struct REMOVE3args {
           diropargs3  object;
      };

      struct REMOVE3resok {
           wcc_data    dir_wcc;
      };

      struct REMOVE3resfail {
           wcc_data    dir_wcc;
      };

      union REMOVE3res switch (nfsstat3 status) {
      case NFS3_OK:
           REMOVE3resok   resok;
      default:
           REMOVE3resfail resfail;
      };

      RMDIR is basically identically structured
*/

pub fn nfsproc3_remove(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut dirops = nfs::diropargs3::default();
    dirops.deserialize(input)?;
    debug!("nfsproc3_remove({:?}, {:?}) ", xid, dirops);

    let dirnode = match resolve(context, &dirops.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_dir_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&dirnode));
    let dir = match dirnode.as_dir() {
        Some(d) => d,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let res = dir.remove(&context.mux, &dirops.name);
    let wcc_res = nfs::wcc_data {
        before: pre_dir_attr,
        after: nfs::post_op_attr::attributes(dir.getattr()),
    };

    match res {
        Ok(()) => {
            debug!("remove success");
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3_OK.serialize(output)?;
            wcc_res.serialize(output)?;
        }
        Err(e) => {
            error!("remove error {:?} --> {:?}", xid, e);
            make_success_reply(xid).serialize(output)?;
            e.serialize(output)?;
            wcc_res.serialize(output)?;
        }
    }

    Ok(())
}

/// Identically structured to REMOVE on the wire; the only difference is
/// which backend method is invoked (directory-typed child required,
/// emptiness is not checked).
pub fn nfsproc3_rmdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut dirops = nfs::diropargs3::default();
    dirops.deserialize(input)?;
    debug!("nfsproc3_rmdir({:?}, {:?}) ", xid, dirops);

    let dirnode = match resolve(context, &dirops.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_dir_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&dirnode));
    let dir = match dirnode.as_dir() {
        Some(d) => d,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let res = dir.rmdir(&context.mux, &dirops.name);
    let wcc_res = nfs::wcc_data {
        before: pre_dir_attr,
        after: nfs::post_op_attr::attributes(dir.getattr()),
    };

    match res {
        Ok(()) => {
            debug!("rmdir success");
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3_OK.serialize(output)?;
            wcc_res.serialize(output)?;
        }
        Err(e) => {
            error!("rmdir error {:?} --> {:?}", xid, e);
            make_success_reply(xid).serialize(output)?;
            e.serialize(output)?;
            wcc_res.serialize(output)?;
        }
    }

    Ok(())
}

/*
 RENAME3res NFSPROC3_RENAME(RENAME3args) = 14;

      struct RENAME3args {
           diropargs3   from;
           diropargs3   to;
      };

      struct RENAME3resok {
           wcc_data     fromdir_wcc;
           wcc_data     todir_wcc;
      };

      struct RENAME3resfail {
           wcc_data     fromdir_wcc;
           wcc_data     todir_wcc;
      };

      union RENAME3res switch (nfsstat3 status) {
      case NFS3_OK:
           RENAME3resok   resok;
      default:
           RENAME3resfail resfail;
      };
*/
/// Overwrites an existing destination entry silently (see design notes).
pub fn nfsproc3_rename(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut fromdirops = nfs::diropargs3::default();
    let mut todirops = nfs::diropargs3::default();
    fromdirops.deserialize(input)?;
    todirops.deserialize(input)?;
    debug!(
        "nfsproc3_rename({:?}, {:?}, {:?}) ",
        xid, fromdirops, todirops
    );

    let from_node = match resolve(context, &fromdirops.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let to_node = match resolve(context, &todirops.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_from_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&from_node));
    let pre_to_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&to_node));

    let (from_dir, to_dir) = match (from_node.as_dir(), to_node.as_dir()) {
        (Some(f), Some(t)) => (f, t),
        _ => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_NOTDIR.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let res = crate::backend::Directory::rename(
        &from_dir,
        &fromdirops.name,
        &to_dir,
        todirops.name.to_vec(),
    );

    let from_wcc = nfs::wcc_data {
        before: pre_from_attr,
        after: nfs::post_op_attr::attributes(from_dir.getattr()),
    };
    let to_wcc = nfs::wcc_data {
        before: pre_to_attr,
        after: nfs::post_op_attr::attributes(to_dir.getattr()),
    };

    match res {
        Ok(()) => {
            debug!("rename success");
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3_OK.serialize(output)?;
            from_wcc.serialize(output)?;
            to_wcc.serialize(output)?;
        }
        Err(e) => {
            error!("rename error {:?} --> {:?}", xid, e);
            make_success_reply(xid).serialize(output)?;
            e.serialize(output)?;
            from_wcc.serialize(output)?;
            to_wcc.serialize(output)?;
        }
    }

    Ok(())
}

/*
     MKDIR3res NFSPROC3_MKDIR(MKDIR3args) = 9;

     struct MKDIR3args {
          diropargs3   where;
          sattr3       attributes;
     };

     struct MKDIR3resok {
          post_op_fh3   obj;
          post_op_attr  obj_attributes;
          wcc_data      dir_wcc;
     };

     struct MKDIR3resfail {
          wcc_data      dir_wcc;
     };

     union MKDIR3res switch (nfsstat3 status) {
     case NFS3_OK:
          MKDIR3resok   resok;
     default:
          MKDIR3resfail resfail;
     };

*/

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct MKDIR3args {
    dirops: nfs::diropargs3,
    attributes: nfs::sattr3,
}
XDRStruct!(MKDIR3args, dirops, attributes);

pub fn nfsproc3_mkdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut args = MKDIR3args::default();
    args.deserialize(input)?;
    debug!("nfsproc3_mkdir({:?}, {:?}) ", xid, args);

    let dirnode = match resolve(context, &args.dirops.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_dir_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&dirnode));
    let dir = match dirnode.as_dir() {
        Some(d) => d,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let node = dir.mkdir(&context.mux, args.dirops.name.to_vec());
    let wcc_res = nfs::wcc_data {
        before: pre_dir_attr,
        after: nfs::post_op_attr::attributes(dir.getattr()),
    };

    debug!("mkdir success --> {:?}", node.id());
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    nfs::post_op_fh3::handle(node.id().to_fh3()).serialize(output)?;
    attr_opt(&node).serialize(output)?;
    wcc_res.serialize(output)?;
    Ok(())
}

/*
     LINK3res NFSPROC3_LINK(LINK3args) = 15;

     struct LINK3args {
          nfs_fh3     file;
          diropargs3  link;
     };

     struct LINK3resok {
          post_op_attr file_attributes;
          wcc_data     linkdir_wcc;
     };

     struct LINK3resfail {
          post_op_attr file_attributes;
          wcc_data     linkdir_wcc;
     };

     union LINK3res switch (nfsstat3 status) {
     case NFS3_OK:
          LINK3resok   resok;
     default:
          LINK3resfail resfail;
     };
*/
#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct LINK3args {
    file: nfs::nfs_fh3,
    link: nfs::diropargs3,
}
XDRStruct!(LINK3args, file, link);

/// Hard links share identity: the new name in the destination directory
/// points at the existing handle, it does not mint a new one.
pub fn nfsproc3_link(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut args = LINK3args::default();
    args.deserialize(input)?;
    debug!("nfsproc3_link({:?}, {:?}) ", xid, args);

    let source = match resolve(context, &args.file) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::post_op_attr::Void.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let dirnode = match resolve(context, &args.link.dir) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            attr_opt(&source).serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_dir_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&dirnode));
    let dir = match dirnode.as_dir() {
        Some(d) => d,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_NOTDIR.serialize(output)?;
            attr_opt(&source).serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    dir.link(args.link.name.to_vec(), source.id());
    let wcc_res = nfs::wcc_data {
        before: pre_dir_attr,
        after: nfs::post_op_attr::attributes(dir.getattr()),
    };
    debug!("link success");
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    attr_opt(&source).serialize(output)?;
    wcc_res.serialize(output)?;
    Ok(())
}

/*
     COMMIT3res NFSPROC3_COMMIT(COMMIT3args) = 21;

     struct COMMIT3args {
          nfs_fh3    file;
          offset3    offset;
          count3     count;
     };

     struct COMMIT3resok {
          wcc_data   file_wcc;
          writeverf3 verf;
     };

     struct COMMIT3resfail {
          wcc_data   file_wcc;
     };

     union COMMIT3res switch (nfsstat3 status) {
     case NFS3_OK:
          COMMIT3resok   resok;
     default:
          COMMIT3resfail resfail;
     };
*/
#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct COMMIT3args {
    file: nfs::nfs_fh3,
    offset: nfs::offset3,
    count: nfs::count3,
}
XDRStruct!(COMMIT3args, file, offset, count);

#[allow(non_camel_case_types)]
#[derive(Debug, Default)]
struct COMMIT3resok {
    file_wcc: nfs::wcc_data,
    verf: nfs::writeverf3,
}
XDRStruct!(COMMIT3resok, file_wcc, verf);

/// Acknowledges without persisting: the backend is memory-only so there
/// is nothing to flush to stable storage.
pub fn nfsproc3_commit(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &RPCContext,
) -> Result<(), anyhow::Error> {
    let mut args = COMMIT3args::default();
    args.deserialize(input)?;
    debug!("nfsproc3_commit({:?}, {:?}) ", xid, args);

    let node = match resolve(context, &args.file) {
        Ok(n) => n,
        Err(stat) => {
            make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_attr = nfs::pre_op_attr::attributes(wcc_attr_of(&node));
    let file = match node.as_file() {
        Some(f) => f,
        None => {
            make_success_reply(xid).serialize(output)?;
            nfs::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            nfs::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    file.commit();

    let res = COMMIT3resok {
        file_wcc: nfs::wcc_data {
            before: pre_attr,
            after: nfs::post_op_attr::attributes(file.getattr()),
        },
        verf: [0u8; 8],
    };
    make_success_reply(xid).serialize(output)?;
    nfs::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}
